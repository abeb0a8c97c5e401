// 该文件是 Shanan （山南西风） 项目的一部分。
// src/postprocess/topk.rs - 分类结果 Top-K
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
  pub index: usize,
  pub score: f32,
}

/// 取分数最高的 `k` 项，降序排列，分数相同时索引小的在前
pub fn top_k(scores: &[f32], k: usize) -> Vec<Score> {
  let mut ranked: Vec<Score> = scores
    .iter()
    .enumerate()
    .map(|(index, &score)| Score { index, score })
    .collect();

  // NaN 排在最后
  let key = |s: &Score| if s.score.is_nan() { f32::NEG_INFINITY } else { s.score };
  ranked.sort_by(|a, b| key(b).total_cmp(&key(a)));
  ranked.truncate(k);
  ranked
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn returns_descending_scores_with_indices() {
    let scores = [0.1, 0.5, 0.05, 0.9, 0.3, 0.7];
    let top = top_k(&scores, 3);
    assert_eq!(
      top,
      vec![
        Score { index: 3, score: 0.9 },
        Score { index: 5, score: 0.7 },
        Score { index: 1, score: 0.5 },
      ]
    );
  }

  #[test]
  fn ties_prefer_lower_index() {
    let top = top_k(&[0.2, 0.8, 0.8, 0.1, 0.8], 2);
    assert_eq!(top[0].index, 1);
    assert_eq!(top[1].index, 2);
  }

  #[test]
  fn k_larger_than_class_count_returns_all() {
    let top = top_k(&[0.3, 0.6], 5);
    assert_eq!(top.len(), 2);
    assert!(top_k(&[], 5).is_empty());
    assert!(top_k(&[1.0], 0).is_empty());
  }

  #[test]
  fn scores_are_non_increasing_and_match_input() {
    let scores: Vec<f32> = (0..100).map(|i| ((i * 37) % 101) as f32 / 101.0).collect();
    let top = top_k(&scores, 10);
    assert_eq!(top.len(), 10);
    for pair in top.windows(2) {
      assert!(pair[0].score >= pair[1].score);
    }
    for s in &top {
      assert_eq!(scores[s.index], s.score);
    }
  }

  #[test]
  fn nan_is_ranked_last() {
    let top = top_k(&[f32::NAN, 0.1, 0.2], 3);
    assert_eq!(top[0].index, 2);
    assert_eq!(top[1].index, 1);
    assert_eq!(top[2].index, 0);
  }
}
