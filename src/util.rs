use crate::error::Error;

/// Compute the broadcasted shape for two shapes, following numpy broadcasting rules.
pub fn broadcast_shapes(op: &str, a: &[usize], b: &[usize]) -> Result<Vec<usize>, Error> {
    let ndim = std::cmp::max(a.len(), b.len());
    let mut result = Vec::with_capacity(ndim);
    for i in 0..ndim {
        let a_dim = if i >= ndim - a.len() {
            a[i - (ndim - a.len())]
        } else {
            1
        };
        let b_dim = if i >= ndim - b.len() {
            b[i - (ndim - b.len())]
        } else {
            1
        };
        if a_dim == b_dim || a_dim == 1 || b_dim == 1 {
            // A zero-sized axis wins over a stretched size-1 axis.
            result.push(if a_dim == 1 { b_dim } else { a_dim });
        } else {
            return Err(Error::IncompatibleShapes {
                op: op.to_string(),
                shape_a: a.to_vec(),
                shape_b: b.to_vec(),
            });
        }
    }
    Ok(result)
}

/// Resolves a possibly negative axis against `ndim`, numpy style.
pub fn normalize_axis(axis: isize, ndim: usize) -> Result<usize, Error> {
    let resolved = if axis < 0 { axis + ndim as isize } else { axis };
    if resolved < 0 || resolved as usize >= ndim {
        return Err(Error::InvalidIndex(vec![axis.unsigned_abs()]));
    }
    Ok(resolved as usize)
}
