pub mod formatter;
pub mod typemap;
