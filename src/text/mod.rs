pub mod lexicon;
pub mod tokenizer;
