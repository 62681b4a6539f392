use crate::{ExportError, ExportProgress, cell_text};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use rowset_core::{CancelToken, GridState};
use std::io::Write;

/// Writes a grid as delimiter-separated lines.
///
/// Quoting is not the csv crate's: only character-typed values are wrapped,
/// and only when `quote_text_types` is set.
pub struct DelimitedExporter {
    pub delimiter: u8,
    pub include_headers: bool,
    pub quote_text_types: bool,
}

impl DelimitedExporter {
    pub fn export(
        &self,
        grid: &GridState,
        writer: &mut dyn Write,
        token: &CancelToken,
        progress: &mut dyn FnMut(ExportProgress),
    ) -> Result<usize, ExportError> {
        let mut csv_writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .quote_style(QuoteStyle::Never)
            .terminator(Terminator::Any(b'\n'))
            .flexible(true)
            .from_writer(writer);

        if self.include_headers {
            csv_writer.write_record(grid.column_names())?;
        }

        let total_rows = grid.row_count();
        let mut written = 0;

        for row in grid.rows() {
            if token.is_cancelled() {
                csv_writer.flush()?;
                return Err(ExportError::Cancelled);
            }

            for cell in row {
                let text = cell_text(cell);
                if self.quote_text_types && cell.sql_type().is_character() {
                    csv_writer.write_field(format!("\"{}\"", text.replace('"', "\"\"")))?;
                } else {
                    csv_writer.write_field(text)?;
                }
            }
            csv_writer.write_record(None::<&[u8]>)?;

            written += 1;
            progress(ExportProgress {
                rows_completed: written,
                total_rows,
            });
        }

        csv_writer.flush()?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowset_core::{CellInput, ColumnDescriptor, GridConfig, SqlType, TableConstraints, Value};

    fn grid(rows: Vec<Vec<Value>>) -> GridState {
        let mut grid = GridState::new(&GridConfig::default());
        grid.load(
            vec![
                ColumnDescriptor::new("col1", SqlType::VarChar, "VARCHAR"),
                ColumnDescriptor::new("col2", SqlType::Integer, "INTEGER"),
            ],
            TableConstraints::default(),
            rows.into_iter()
                .map(|row| row.into_iter().map(CellInput::from).collect::<Vec<_>>()),
        )
        .unwrap();
        grid
    }

    fn export(exporter: &DelimitedExporter, grid: &GridState) -> String {
        let mut buf: Vec<u8> = Vec::new();
        exporter
            .export(grid, &mut buf, &CancelToken::new(), &mut |_| {})
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn quotes_character_columns_containing_delimiter() {
        let grid = grid(vec![
            vec![Value::Text("a,b".into()), Value::Int(1)],
            vec![Value::Text("c".into()), Value::Int(2)],
        ]);
        let exporter = DelimitedExporter {
            delimiter: b',',
            include_headers: true,
            quote_text_types: true,
        };

        let output = export(&exporter, &grid);

        assert_eq!(output, "col1,col2\n\"a,b\",1\n\"c\",2\n");
    }

    #[test]
    fn unquoted_export_writes_values_raw() {
        let grid = grid(vec![vec![Value::Text("x".into()), Value::Int(7)]]);
        let exporter = DelimitedExporter {
            delimiter: b'|',
            include_headers: false,
            quote_text_types: false,
        };

        assert_eq!(export(&exporter, &grid), "x|7\n");
    }

    #[test]
    fn nulls_export_as_empty_fields() {
        let grid = grid(vec![vec![Value::Null, Value::Null]]);
        let exporter = DelimitedExporter {
            delimiter: b';',
            include_headers: false,
            quote_text_types: false,
        };

        assert_eq!(export(&exporter, &grid), ";\n");
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        let grid = grid(vec![vec![Value::Text("say \"hi\"".into()), Value::Int(1)]]);
        let exporter = DelimitedExporter {
            delimiter: b'|',
            include_headers: false,
            quote_text_types: true,
        };

        assert_eq!(export(&exporter, &grid), "\"say \"\"hi\"\"\"|1\n");
    }

    #[test]
    fn progress_is_reported_per_row() {
        let grid = grid(vec![
            vec![Value::Text("a".into()), Value::Int(1)],
            vec![Value::Text("b".into()), Value::Int(2)],
        ]);
        let exporter = DelimitedExporter {
            delimiter: b',',
            include_headers: false,
            quote_text_types: false,
        };
        let mut seen = Vec::new();

        exporter
            .export(&grid, &mut Vec::<u8>::new(), &CancelToken::new(), &mut |p| seen.push(p))
            .unwrap();

        assert_eq!(
            seen,
            vec![
                ExportProgress { rows_completed: 1, total_rows: 2 },
                ExportProgress { rows_completed: 2, total_rows: 2 },
            ]
        );
    }

    #[test]
    fn cancelled_token_stops_before_next_row() {
        let grid = grid(vec![vec![Value::Text("a".into()), Value::Int(1)]]);
        let exporter = DelimitedExporter {
            delimiter: b',',
            include_headers: true,
            quote_text_types: false,
        };
        let token = CancelToken::new();
        token.cancel();
        let mut buf: Vec<u8> = Vec::new();

        let err = exporter
            .export(&grid, &mut buf, &token, &mut |_| {})
            .unwrap_err();

        assert!(matches!(err, ExportError::Cancelled));
        assert_eq!(String::from_utf8(buf).unwrap(), "col1,col2\n");
    }
}
