/// Widest cell rendered by [`FeedTable::to_text`] before truncation.
const MAX_CELL_WIDTH: usize = 50;

/// Immutable, ordered feed rows sharing one column schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl FeedTable {
    /// Rows are padded with empty cells or cut to the column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// First column with this name; duplicates after aliasing keep their order.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Copy of the rows at `indices`, in the order given.
    pub fn select_rows(&self, indices: &[usize]) -> FeedTable {
        FeedTable {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Plain-text grid with a leading row-number column, cells right-aligned.
    pub fn to_text(&self) -> String {
        let index: Vec<String> = (0..self.rows.len()).map(|i| i.to_string()).collect();
        let header: Vec<String> = self.columns.iter().map(|c| display_cell(c)).collect();
        let body: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(|c| display_cell(c)).collect())
            .collect();

        let index_width = index.iter().map(|s| s.chars().count()).max().unwrap_or(0);
        let widths: Vec<usize> = header
            .iter()
            .enumerate()
            .map(|(col, h)| {
                body.iter()
                    .map(|row| row[col].chars().count())
                    .chain(std::iter::once(h.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        push_line(&mut out, "", index_width, &header, &widths);
        for (i, row) in body.iter().enumerate() {
            push_line(&mut out, &index[i], index_width, row, &widths);
        }
        out
    }
}

#[cfg(test)]
impl FeedTable {
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| r[idx].as_str())
    }
}

fn display_cell(raw: &str) -> String {
    let flat: String = raw
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let flat = flat.trim();
    if flat.chars().count() > MAX_CELL_WIDTH {
        let cut: String = flat.chars().take(MAX_CELL_WIDTH - 3).collect();
        format!("{cut}...")
    } else {
        flat.to_string()
    }
}

fn push_line(out: &mut String, label: &str, label_width: usize, cells: &[String], widths: &[usize]) {
    let mut line = format!("{label:<label_width$}");
    for (cell, width) in cells.iter().zip(widths) {
        let pad = width.saturating_sub(cell.chars().count());
        line.push_str("  ");
        line.extend(std::iter::repeat(' ').take(pad));
        line.push_str(cell);
    }
    out.push_str(line.trim_end());
    out.push('\n');
}
