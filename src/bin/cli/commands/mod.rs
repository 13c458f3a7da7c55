pub mod decode;
pub mod import;
