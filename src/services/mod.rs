pub mod extraction;
pub mod merge;
pub mod ocr;
pub mod storage;
pub mod text_parser;
pub mod vision;
pub mod worker;
