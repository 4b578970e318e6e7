use ndarray::Array2;

/// Clears every 8-connected group of `true` pixels that has fewer than `min_size` members.
pub fn remove_small_objects(mask: &Array2<bool>, min_size: usize) -> Array2<bool> {
    let (rows, cols) = mask.dim();
    let mut out = mask.clone();
    let mut seen = Array2::from_elem((rows, cols), false);
    let mut stack = Vec::new();
    let mut component = Vec::new();

    for ((row, col), &set) in mask.indexed_iter() {
        if !set || seen[[row, col]] {
            continue;
        }

        seen[[row, col]] = true;
        stack.push((row, col));
        component.clear();

        while let Some((y, x)) = stack.pop() {
            component.push((y, x));
            for (ny, nx) in neighbours(y, x, rows, cols) {
                if mask[[ny, nx]] && !seen[[ny, nx]] {
                    seen[[ny, nx]] = true;
                    stack.push((ny, nx));
                }
            }
        }

        if component.len() < min_size {
            for &(y, x) in &component {
                out[[y, x]] = false;
            }
        }
    }

    out
}

fn neighbours(
    y: usize,
    x: usize,
    rows: usize,
    cols: usize,
) -> impl Iterator<Item = (usize, usize)> {
    let row_range = y.saturating_sub(1)..=(y + 1).min(rows - 1);
    row_range
        .flat_map(move |ny| (x.saturating_sub(1)..=(x + 1).min(cols - 1)).map(move |nx| (ny, nx)))
        .filter(move |&pos| pos != (y, x))
}
