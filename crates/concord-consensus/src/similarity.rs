use std::collections::HashSet;

/// Jaccard index of two word sets. Two empty sets are identical.
pub(crate) fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
  if a.is_empty() && b.is_empty() {
    return 1.0;
  }
  let intersection = a.intersection(b).count() as f64;
  let union = a.union(b).count() as f64;
  intersection / union
}

/// Symmetric matrix with a unit diagonal.
pub(crate) fn pairwise(sets: &[HashSet<String>]) -> Vec<Vec<f64>> {
  let n = sets.len();
  let mut matrix = vec![vec![1.0; n]; n];
  for i in 0..n {
    for j in (i + 1)..n {
      let sim = jaccard(&sets[i], &sets[j]);
      matrix[i][j] = sim;
      matrix[j][i] = sim;
    }
  }
  matrix
}

/// Mean and minimum over the upper triangle.
pub(crate) fn summarize(matrix: &[Vec<f64>]) -> (f64, f64) {
  let mut sum = 0.0;
  let mut min = 1.0_f64;
  let mut pairs = 0;
  for i in 0..matrix.len() {
    for j in (i + 1)..matrix.len() {
      sum += matrix[i][j];
      min = min.min(matrix[i][j]);
      pairs += 1;
    }
  }
  if pairs == 0 {
    (1.0, 1.0)
  } else {
    (sum / pairs as f64, min)
  }
}
