#![allow(dead_code)]

mod writer;

pub use self::writer::Writer;

use blip::runtime;

/// Renders a generated render function into a string.
#[track_caller]
pub fn render<F>(f: F) -> String
where
    F: FnOnce(&mut Writer) -> runtime::Result<()>,
{
    let mut w = Writer::new();
    f(&mut w).unwrap();
    w.into_string()
}
