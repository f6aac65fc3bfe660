/// Pooling/reduction engine
///
/// Block-average and block-peak downsampling of a grid. Both go through
/// `f64` the same way, so the result depends only on the input grid.

use crate::grid::Grid;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Block size must be non-zero, got {v_block}x{h_block}")]
    ZeroBlock { v_block: usize, h_block: usize },

    #[error("Grid {rows}x{cols} is not divisible into {v_block}x{h_block} blocks")]
    Indivisible {
        rows: usize,
        cols: usize,
        v_block: usize,
        h_block: usize,
    },
}

/// Numeric cell type that can pass through a reduction
pub trait PoolCell: Copy {
    fn to_f64(self) -> f64;

    /// Truncating (and for integers, saturating) conversion back
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_pool_cell {
    ($($t:ty),*) => {
        $(
            impl PoolCell for $t {
                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn from_f64(value: f64) -> Self {
                    value as $t
                }
            }
        )*
    };
}

impl_pool_cell!(u8, u16, u32, i16, i32, i64, f32, f64);

/// Each output cell is the mean of its `v_block` x `h_block` source block
pub fn pool_average<T: PoolCell, U: PoolCell>(
    grid: &Grid<T>,
    v_block: usize,
    h_block: usize,
) -> Result<Grid<U>, PoolError> {
    let count = (v_block * h_block) as f64;
    reduce(grid, v_block, h_block, |block| {
        block.fold(0.0, |sum, v| sum + v) / count
    })
}

/// Each output cell is the maximum of its `v_block` x `h_block` source block
pub fn pool_peak<T: PoolCell, U: PoolCell>(
    grid: &Grid<T>,
    v_block: usize,
    h_block: usize,
) -> Result<Grid<U>, PoolError> {
    reduce(grid, v_block, h_block, |block| {
        block.fold(f64::NEG_INFINITY, f64::max)
    })
}

fn reduce<T, U, F>(grid: &Grid<T>, v_block: usize, h_block: usize, mut combine: F) -> Result<Grid<U>, PoolError>
where
    T: PoolCell,
    U: PoolCell,
    F: FnMut(&mut dyn Iterator<Item = f64>) -> f64,
{
    check_blocks(grid.rows(), grid.cols(), v_block, h_block)?;

    let out_rows = grid.rows() / v_block;
    let out_cols = grid.cols() / h_block;
    let mut pooled = Grid::filled(out_rows, out_cols, U::from_f64(0.0));

    for block_row in 0..out_rows {
        for block_col in 0..out_cols {
            let rows = block_row * v_block..(block_row + 1) * v_block;
            let cols = block_col * h_block..(block_col + 1) * h_block;
            let mut block = rows.flat_map(|r| {
                grid.row(r)[cols.clone()].iter().map(|&v| v.to_f64())
            });
            pooled.set(block_row, block_col, U::from_f64(combine(&mut block)));
        }
    }

    Ok(pooled)
}

/// Check that `v_block` x `h_block` tiles a `rows` x `cols` grid exactly
pub fn check_blocks(rows: usize, cols: usize, v_block: usize, h_block: usize) -> Result<(), PoolError> {
    if v_block == 0 || h_block == 0 {
        return Err(PoolError::ZeroBlock { v_block, h_block });
    }
    if rows % v_block != 0 || cols % h_block != 0 {
        return Err(PoolError::Indivisible {
            rows,
            cols,
            v_block,
            h_block,
        });
    }
    Ok(())
}
