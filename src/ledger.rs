//! Per-character status record for the current prompt.
//!
//! The ledger is indexed by `char` position, not byte offset. Out-of-range
//! indices are clamped or ignored; nothing here panics on caller input.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharStatus {
    Pending,
    Correct,
    Incorrect,
    Missed,
}

/// One prompt position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub glyph: char,
    pub status: CharStatus,
}

/// Outcome of skipping the rest of a word with the space key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceSkip {
    /// Cursor position after the skip.
    pub new_index: usize,
    /// Prompt text consumed by the skip, to be appended to the input buffer.
    pub consumed: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub missed: usize,
}

impl StatusCounts {
    pub fn tally(chars: &[Character]) -> Self {
        chars.iter().fold(Self::default(), |mut counts, ch| {
            match ch.status {
                CharStatus::Pending => counts.pending += 1,
                CharStatus::Correct => counts.correct += 1,
                CharStatus::Incorrect => counts.incorrect += 1,
                CharStatus::Missed => counts.missed += 1,
            }
            counts
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    chars: Vec<Character>,
    // positions forced to incorrect by a space skip
    skipped: Vec<bool>,
}

impl Ledger {
    pub fn new(prompt: &str) -> Self {
        let chars: Vec<Character> = prompt
            .chars()
            .map(|glyph| Character {
                glyph,
                status: CharStatus::Pending,
            })
            .collect();
        let skipped = vec![false; chars.len()];
        Self { chars, skipped }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn chars(&self) -> &[Character] {
        &self.chars
    }

    pub fn get(&self, idx: usize) -> Option<&Character> {
        self.chars.get(idx)
    }

    pub fn expected_char(&self, idx: usize) -> Option<char> {
        self.chars.get(idx).map(|c| c.glyph)
    }

    /// Full recompute from the whole input buffer: typed positions are scored,
    /// everything from the end of the input onward goes back to pending.
    pub fn apply_input(&mut self, input: &str) {
        let mut typed = input.chars();
        for (idx, ch) in self.chars.iter_mut().enumerate() {
            match typed.next() {
                Some(_) if self.skipped[idx] => ch.status = CharStatus::Incorrect,
                Some(c) => {
                    ch.status = if c == ch.glyph {
                        CharStatus::Correct
                    } else {
                        CharStatus::Incorrect
                    }
                }
                None => {
                    ch.status = CharStatus::Pending;
                    self.skipped[idx] = false;
                }
            }
        }
    }

    /// Marks the rest of the word starting at `from` as incorrect and consumes
    /// the following space. Returns `None` when `from` is at or past the final
    /// character.
    ///
    /// In the last word there is no space to consume: the rest of the word is
    /// shown as incorrect, but nothing is consumed and the next recompute
    /// scores those positions normally again.
    pub fn apply_space_skip(&mut self, from: usize) -> Option<SpaceSkip> {
        if from >= self.chars.len().saturating_sub(1) {
            return None;
        }

        let Some(boundary) = self.chars[from..]
            .iter()
            .position(|c| c.glyph == ' ')
            .map(|offset| from + offset)
        else {
            for ch in &mut self.chars[from..] {
                ch.status = CharStatus::Incorrect;
            }
            return Some(SpaceSkip {
                new_index: from,
                consumed: String::new(),
            });
        };

        for idx in from..boundary {
            self.chars[idx].status = CharStatus::Incorrect;
            self.skipped[idx] = true;
        }
        self.chars[boundary].status = CharStatus::Correct;

        let new_index = boundary + 1;
        let consumed = self.chars[from..new_index].iter().map(|c| c.glyph).collect();

        Some(SpaceSkip {
            new_index,
            consumed,
        })
    }

    /// Reclassifies every still-pending character as missed. Used once, at finish.
    pub fn mark_missed(&mut self) {
        for ch in self.chars.iter_mut() {
            if ch.status == CharStatus::Pending {
                ch.status = CharStatus::Missed;
            }
        }
    }

    pub fn counts(&self) -> StatusCounts {
        StatusCounts::tally(&self.chars)
    }
}
