pub mod oracle;
pub mod ranker;
pub mod similarity;
