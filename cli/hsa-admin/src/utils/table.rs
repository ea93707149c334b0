use std::fmt::{self, Display};

const COLUMN_GAP: &str = "  ";

/// Left aligned plain text columns, sized to their widest cell.
#[derive(Debug, Clone)]
pub struct Table {
    header: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(header: Vec<&'static str>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    /// Missing cells are left empty, extra cells are dropped.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.header.len(), String::new());
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        self.header
            .iter()
            .enumerate()
            .map(|(column, title)| {
                self.rows
                    .iter()
                    .map(|row| row[column].chars().count())
                    .chain([title.chars().count()])
                    .max()
                    .unwrap_or_default()
            })
            .collect()
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.widths();
        let header = self.header.iter().map(|title| title.to_string()).collect::<Vec<_>>();

        for row in std::iter::once(&header).chain(&self.rows) {
            let line = row
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join(COLUMN_GAP);
            writeln!(f, "{}", line.trim_end())?;
        }
        Ok(())
    }
}

/// `-` for absent values
pub fn cell(value: Option<impl Display>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn columns_fit_widest_cell() {
        let mut table = Table::new(vec!["ID", "NAME", "EMAIL"]);
        table.push_row(vec!["1".into(), "Emily Johnson".into(), "emily@x.com".into()]);
        table.push_row(vec!["12".into(), "Ada".into()]);

        assert_eq!(table.to_string(), indoc! {"
            ID  NAME           EMAIL
            1   Emily Johnson  emily@x.com
            12  Ada
        "});
    }

    #[test]
    fn absent_cells() {
        assert_eq!(cell(None::<&str>), "-");
        assert_eq!(cell(Some(4.5)), "4.5");
    }
}
