use crate::ExportError;
use rowset_core::{CancelToken, GridState};
use std::io::Write;

/// Serializes a whole grid as an XML document.
pub trait XmlWriter: Send + Sync {
    fn write(
        &self,
        grid: &GridState,
        out: &mut dyn Write,
        token: &CancelToken,
    ) -> Result<(), ExportError>;
}

/// Writes `<ResultSet>` with one `<Row>` per grid row and one `<Column>`
/// element per cell. Null cells carry `null="true"` and no text.
pub struct ResultSetXmlWriter;

impl XmlWriter for ResultSetXmlWriter {
    fn write(
        &self,
        grid: &GridState,
        out: &mut dyn Write,
        token: &CancelToken,
    ) -> Result<(), ExportError> {
        writeln!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
        writeln!(out, "<ResultSet>")?;

        for (index, row) in grid.rows().iter().enumerate() {
            if token.is_cancelled() {
                return Err(ExportError::Cancelled);
            }

            writeln!(out, "  <Row number=\"{}\">", index + 1)?;
            for cell in row {
                let name = escape(cell.column_name());
                if cell.is_null() {
                    writeln!(out, "    <Column name=\"{}\" null=\"true\"/>", name)?;
                } else {
                    writeln!(
                        out,
                        "    <Column name=\"{}\">{}</Column>",
                        name,
                        escape(&cell.display_value())
                    )?;
                }
            }
            writeln!(out, "  </Row>")?;
        }

        writeln!(out, "</ResultSet>")?;
        out.flush()?;
        Ok(())
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}
