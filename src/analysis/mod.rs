pub mod tokenizer;
pub mod similarity;
