use include_dir::{include_dir, Dir};
use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use std::sync::OnceLock;

use crate::settings::Difficulty;

static LANG_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/lang");

/// A fixed word list embedded in the binary.
#[derive(Deserialize, Clone, Debug)]
pub struct WordList {
    pub name: String,
    pub size: u32,
    pub words: Vec<String>,
}

impl WordList {
    /// The embedded list for a difficulty tier.
    pub fn for_difficulty(difficulty: Difficulty) -> &'static WordList {
        static EASY: OnceLock<WordList> = OnceLock::new();
        static HARD: OnceLock<WordList> = OnceLock::new();

        match difficulty {
            Difficulty::Easy => EASY.get_or_init(|| read_word_list("easy.json")),
            Difficulty::Hard => HARD.get_or_init(|| read_word_list("hard.json")),
        }
    }
}

fn read_word_list(file_name: &str) -> WordList {
    let file = LANG_DIR
        .get_file(file_name)
        .expect("word list file not found");

    let contents = file
        .contents_utf8()
        .expect("unable to interpret word list as a string");

    serde_json::from_str(contents).expect("unable to deserialize word list json")
}

/// Where session prompts come from.
pub trait PromptSource {
    fn prompt(&mut self, word_count: usize, difficulty: Difficulty) -> String;
}

/// Uniform random draws from the embedded word lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomWords;

impl PromptSource for RandomWords {
    fn prompt(&mut self, word_count: usize, difficulty: Difficulty) -> String {
        generate(word_count, difficulty)
    }
}

/// The same text every time, whatever the settings ask for.
#[derive(Debug, Clone)]
pub struct FixedPrompt(pub String);

impl PromptSource for FixedPrompt {
    fn prompt(&mut self, _word_count: usize, _difficulty: Difficulty) -> String {
        self.0.clone()
    }
}

/// Prompt text of `word_count` words drawn uniformly with replacement, joined by single spaces.
pub fn generate(word_count: usize, difficulty: Difficulty) -> String {
    generate_with(&mut rand::thread_rng(), word_count, difficulty)
}

pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, word_count: usize, difficulty: Difficulty) -> String {
    let words = &WordList::for_difficulty(difficulty).words;
    (0..word_count)
        .filter_map(|_| words.choose(rng))
        .join(" ")
}
