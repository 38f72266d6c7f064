//! Concord Segment
//!
//! Splits oversized input into chunks of at most `max_unit_size` bytes,
//! cutting at the largest safe boundary. Boundaries are preferred in this
//! order: paragraph break, sentence end, whitespace, then a hard cut on a
//! character boundary. Fenced code blocks (```` ``` ```` or `~~~`) are never
//! cut; a fence longer than the limit is emitted whole as one oversized chunk.
//!
//! Chunks are contiguous slices of the input, so concatenating them in order
//! reconstructs it exactly.

use std::iter::FusedIterator;
use std::ops::Range;

use tracing::trace;

/// Reusable segmentation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segmenter {
  max_unit_size: usize,
}

impl Segmenter {
  pub fn new(max_unit_size: usize) -> Self {
    Self {
      max_unit_size: max_unit_size.max(1),
    }
  }

  pub fn max_unit_size(&self) -> usize {
    self.max_unit_size
  }

  pub fn segment<'a>(&self, text: &'a str) -> Segments<'a> {
    Segments {
      text,
      max: self.max_unit_size,
      pos: 0,
      fences: find_fences(text),
    }
  }
}

/// Split `text` into chunks of at most `max_unit_size` bytes.
pub fn segment(text: &str, max_unit_size: usize) -> Segments<'_> {
  Segmenter::new(max_unit_size).segment(text)
}

/// Ordered chunks of one input. Clone it, or call [`Segments::restart`], to
/// iterate again from the beginning.
#[derive(Debug, Clone)]
pub struct Segments<'a> {
  text: &'a str,
  max: usize,
  pos: usize,
  fences: Vec<Range<usize>>,
}

#[derive(Debug, Clone, Copy)]
enum Boundary {
  Paragraph,
  Sentence,
  Whitespace,
}

impl<'a> Segments<'a> {
  pub fn restart(&mut self) {
    self.pos = 0;
  }

  fn inside_fence(&self, cut: usize) -> Option<&Range<usize>> {
    self
      .fences
      .iter()
      .find(|fence| fence.start < cut && cut < fence.end)
  }

  /// Largest cut of the given kind in `(lo, hi]` that is not inside a fence.
  fn last_boundary(&self, lo: usize, hi: usize, kind: Boundary) -> Option<usize> {
    let window = &self.text[lo..hi];
    let mut best = None;

    match kind {
      Boundary::Paragraph => {
        for (i, _) in window.match_indices("\n\n") {
          best = self.accept(best, lo + i + 2);
        }
      }
      Boundary::Sentence => {
        let mut chars = window.char_indices().peekable();
        while let Some((_, ch)) = chars.next() {
          if matches!(ch, '.' | '!' | '?') {
            if let Some(&(j, next)) = chars.peek() {
              if next.is_whitespace() {
                best = self.accept(best, lo + j + next.len_utf8());
              }
            }
          }
        }
      }
      Boundary::Whitespace => {
        for (i, ch) in window.char_indices() {
          if ch.is_whitespace() {
            best = self.accept(best, lo + i + ch.len_utf8());
          }
        }
      }
    }

    best
  }

  fn accept(&self, best: Option<usize>, cut: usize) -> Option<usize> {
    if self.inside_fence(cut).is_some() {
      best
    } else {
      Some(cut)
    }
  }

  fn hard_cut(&self, limit: usize) -> usize {
    let mut cut = limit;
    while !self.text.is_char_boundary(cut) {
      cut -= 1;
    }
    if cut == self.pos {
      // Limit smaller than the next character: emit that character alone.
      cut = self.pos
        + self.text[self.pos..]
          .chars()
          .next()
          .map_or(0, char::len_utf8);
    }
    cut
  }

  fn next_cut(&self) -> usize {
    let pos = self.pos;
    let limit = pos + self.max;

    if let Some(fence) = self.fences.iter().find(|f| f.start == pos) {
      if fence.end > limit {
        trace!(start = fence.start, end = fence.end, "oversized_fence_emitted");
        return fence.end;
      }
    }

    let limit = self.hard_cut(limit);
    for kind in [Boundary::Paragraph, Boundary::Sentence, Boundary::Whitespace] {
      if let Some(cut) = self.last_boundary(pos, limit, kind) {
        return cut;
      }
    }

    match self.inside_fence(limit) {
      Some(fence) if fence.start > pos => fence.start,
      Some(fence) => fence.end,
      None => limit,
    }
  }
}

impl<'a> Iterator for Segments<'a> {
  type Item = &'a str;

  fn next(&mut self) -> Option<&'a str> {
    let len = self.text.len();
    if self.pos >= len {
      return None;
    }

    let cut = if len - self.pos <= self.max {
      len
    } else {
      self.next_cut()
    };

    let chunk = &self.text[self.pos..cut];
    self.pos = cut;
    Some(chunk)
  }
}

impl FusedIterator for Segments<'_> {}

/// Byte ranges of fenced blocks, from the opening line start to the end of the
/// closing line. An unclosed fence runs to the end of the text.
fn find_fences(text: &str) -> Vec<Range<usize>> {
  let mut fences = Vec::new();
  let mut open: Option<(usize, &str)> = None;
  let mut line_start = 0;

  for line in text.split_inclusive('\n') {
    let line_end = line_start + line.len();
    let trimmed = line.trim_start();
    let marker = if trimmed.starts_with("```") {
      Some("```")
    } else if trimmed.starts_with("~~~") {
      Some("~~~")
    } else {
      None
    };

    match (open, marker) {
      (None, Some(m)) => open = Some((line_start, m)),
      (Some((start, m)), Some(found)) if m == found => {
        fences.push(start..line_end);
        open = None;
      }
      _ => {}
    }
    line_start = line_end;
  }

  if let Some((start, _)) = open {
    fences.push(start..text.len());
  }
  fences
}
