pub mod editor;
pub mod publish;
pub mod trace;
