/// Row-major 2-D grid shared by spectrograms and pooled grids

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("Ragged rows: row {row} has {found} cells, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Cell count {cells} does not match {rows}x{cols}")]
    Shape { rows: usize, cols: usize, cells: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

impl<T: Copy> Grid<T> {
    /// Grid of `rows` x `cols` cells all set to `value`
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            rows,
            cols,
            cells: vec![value; rows * cols],
        }
    }

    pub fn from_vec(rows: usize, cols: usize, cells: Vec<T>) -> Result<Self, GridError> {
        if cells.len() != rows * cols {
            return Err(GridError::Shape {
                rows,
                cols,
                cells: cells.len(),
            });
        }
        Ok(Self { rows, cols, cells })
    }

    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self, GridError> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut cells = Vec::with_capacity(rows.len() * cols);

        for (row, values) in rows.iter().enumerate() {
            if values.len() != cols {
                return Err(GridError::Ragged {
                    row,
                    expected: cols,
                    found: values.len(),
                });
            }
            cells.extend_from_slice(values);
        }

        Ok(Self {
            rows: rows.len(),
            cols,
            cells,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> T {
        self.cells[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) {
        self.cells[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[T] {
        &self.cells[row * self.cols..(row + 1) * self.cols]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [T] {
        &mut self.cells[row * self.cols..(row + 1) * self.cols]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[T]> {
        (0..self.rows).map(move |r| self.row(r))
    }

    /// All cells in row-major order
    pub fn cells(&self) -> &[T] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows() {
        let grid = Grid::from_rows(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
        assert_eq!(grid.shape(), (2, 3));
        assert_eq!(grid.get(1, 0), 4);
        assert_eq!(grid.row(0), &[1, 2, 3]);
        assert_eq!(grid.cells(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = Grid::from_rows(vec![vec![1, 2], vec![3]]);
        assert_eq!(
            result,
            Err(GridError::Ragged {
                row: 1,
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn test_set_and_rows() {
        let mut grid = Grid::filled(2, 2, 0u16);
        grid.set(1, 1, 9);
        grid.row_mut(0)[1] = 4;

        let rows: Vec<&[u16]> = grid.iter_rows().collect();
        assert_eq!(rows, vec![&[0, 4][..], &[0, 9][..]]);
    }

    #[test]
    fn test_from_vec_shape_check() {
        assert!(Grid::from_vec(2, 2, vec![1, 2, 3, 4]).is_ok());
        assert!(Grid::from_vec(2, 3, vec![1, 2, 3, 4]).is_err());
    }
}
