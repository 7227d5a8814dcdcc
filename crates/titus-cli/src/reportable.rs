use anyhow::Result;

/// A type whose contents can be written out in one of several output formats.
pub trait Reportable {
    type Format;

    fn report<W: std::io::Write>(&self, format: Self::Format, writer: W) -> Result<()>;
}
