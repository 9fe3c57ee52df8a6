mod common;
mod compute_pi;
mod document_analysis;
mod rerun;
