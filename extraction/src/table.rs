use std::ops::{Deref, DerefMut};

/// Cells of a table found on a PDF page, row by row.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Table(pub Vec<Row>);

impl Table {
    /// Renders each non-empty row as its cells joined by `" | "`.
    pub fn pipe_joined_rows(&self) -> impl Iterator<Item = String> + '_ {
        self.0
            .iter()
            .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
            .map(Row::pipe_joined)
    }
}

impl Deref for Table {
    type Target = Vec<Row>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Table {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<C, R> From<C> for Table
where
    C: IntoIterator<Item = R>,
    R: Into<Row>,
{
    fn from(value: C) -> Self {
        Table(value.into_iter().map(Into::into).collect())
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Row(pub Vec<String>);

impl Row {
    pub fn pipe_joined(&self) -> String {
        self.0
            .iter()
            .map(|cell| cell.trim())
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl Deref for Row {
    type Target = Vec<String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Row {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<C, S> From<C> for Row
where
    C: IntoIterator<Item = S>,
    S: Into<String>,
{
    fn from(value: C) -> Self {
        Row(value.into_iter().map(Into::into).collect())
    }
}
