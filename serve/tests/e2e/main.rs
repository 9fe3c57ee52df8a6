mod common;
mod naive_endpoints;
mod push_channel;
