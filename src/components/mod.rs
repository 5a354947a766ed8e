pub mod crop;
pub mod history;
pub mod text_entry;
pub mod tools;
