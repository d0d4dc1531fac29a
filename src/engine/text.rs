//! Text embedding workload
//!
//! Tokenizes corpus sentences, looks up hashed word embeddings, computes
//! cosine similarity and nearest neighbours, and scores sentiment against a
//! small lexicon.

use std::collections::HashMap;
use std::hint::black_box;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::{record_failure, EngineError, WorkloadEngine};
use crate::models::{Detection, EngineKind, StatsRecorder};

pub const EMBEDDING_DIM: usize = 64;
const NEIGHBORS: usize = 5;

const DEFAULT_CORPUS: [&str; 20] = [
    "A quiet harbor wakes as fishing boats return with the morning tide.",
    "Machine learning systems improve when training data is clean and diverse.",
    "Rust programs trade a little compile time for strong memory safety.",
    "Language models map words into dense vectors that capture meaning.",
    "Dedicated accelerators run neural inference with remarkable efficiency.",
    "Training large networks consumes enormous amounts of compute and energy.",
    "Image recognition can find cars, faces and handwriting in photographs.",
    "Document classification keeps huge archives searchable and organized.",
    "Sentiment scoring estimates whether a review sounds happy or angry.",
    "Entity extraction pulls names, places and dates out of raw text.",
    "Deep networks learn layered features from millions of labeled examples.",
    "Attention layers let a model weigh distant tokens against each other.",
    "Convolution filters slide across pixels to detect edges and textures.",
    "Sequence models read sensor streams one timestep after another.",
    "Pretrained weights transfer surprisingly well to brand new tasks.",
    "Random crops and flips stretch a small dataset into a larger one.",
    "Dropout and weight decay keep an eager network from memorizing noise.",
    "Each optimizer step nudges parameters a little further downhill.",
    "Careful tuning of learning rates often matters more than architecture.",
    "The terrible outage was fixed quickly and everyone was delighted.",
];

const POSITIVE: [&str; 10] = [
    "improve", "strong", "remarkable", "efficiency", "happy", "well", "delighted", "clean",
    "surprisingly", "safety",
];
const NEGATIVE: [&str; 6] = ["angry", "terrible", "outage", "noise", "enormous", "eager"];

/// Lexical classes guessed from word endings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexicalClass {
    Noun,
    Verb,
    Adjective,
    Adverb,
}

pub struct TextEmbeddingEngine {
    rng: SmallRng,
    corpus: Vec<String>,
    vocabulary: HashMap<String, usize>,
    embeddings: Vec<f32>,
    tokens: Vec<usize>,
    scores: Vec<(f32, usize)>,
    word: String,
}

impl TextEmbeddingEngine {
    pub fn new(rng: SmallRng) -> Self {
        Self::with_corpus(rng, DEFAULT_CORPUS.iter().map(|s| s.to_string()).collect())
    }

    /// Build the vocabulary and embedding table for `corpus`
    pub fn with_corpus(rng: SmallRng, corpus: Vec<String>) -> Self {
        let mut vocabulary = HashMap::new();
        let mut embeddings = Vec::new();
        let mut word = String::new();

        for sentence in &corpus {
            for raw in sentence.split_whitespace() {
                normalize_word(raw, &mut word);
                if word.is_empty() || vocabulary.contains_key(word.as_str()) {
                    continue;
                }
                vocabulary.insert(word.clone(), vocabulary.len());
                embeddings.extend(word_vector(&word));
            }
        }

        let vocab_len = vocabulary.len();
        Self {
            rng,
            corpus,
            vocabulary,
            embeddings,
            tokens: Vec::new(),
            scores: Vec::with_capacity(vocab_len),
            word,
        }
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// One unit; every sentence that gets this far is scored, neutral included
    fn run_unit(&mut self) -> Result<(), EngineError> {
        let Self {
            rng,
            corpus,
            vocabulary,
            embeddings,
            tokens,
            scores,
            word,
        } = self;

        if corpus.is_empty() {
            return Err(EngineError::ResourceUnavailable("empty corpus".to_string()));
        }
        let sentence = &corpus[rng.gen_range(0..corpus.len())];

        tokens.clear();
        let mut sentiment = 0i32;
        let mut classes = [0u32; 4];
        for raw in sentence.split_whitespace() {
            normalize_word(raw, word);
            if word.is_empty() {
                continue;
            }
            let id = vocabulary.get(word.as_str()).copied().ok_or_else(|| {
                EngineError::ResourceUnavailable(format!("no embedding for '{}'", word))
            })?;
            tokens.push(id);

            if POSITIVE.contains(&word.as_str()) {
                sentiment += 1;
            } else if NEGATIVE.contains(&word.as_str()) {
                sentiment -= 1;
            }
            classes[lexical_class(word) as usize] += 1;
        }
        if tokens.is_empty() {
            return Err(EngineError::EmptyInput("sentence has no words".to_string()));
        }

        if tokens.len() >= 2 {
            let similarity = cosine(embedding(embeddings, tokens[0]), embedding(embeddings, tokens[1]));
            if !similarity.is_finite() {
                return Err(EngineError::NonFinite("word similarity"));
            }
            black_box(similarity);
        }

        nearest_neighbors(embeddings, tokens[0], scores);
        black_box(&scores[..scores.len().min(NEIGHBORS)]);
        black_box(classes);

        let score = sentiment as f32 / tokens.len() as f32;
        black_box(score);
        Ok(())
    }
}

impl WorkloadEngine for TextEmbeddingEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::TextEmbedding
    }

    fn run_operations(&mut self, iterations: u32, stats: &mut StatsRecorder<'_>) {
        for _ in 0..iterations {
            match self.run_unit() {
                Ok(()) => {
                    stats.record_operations(1);
                    stats.record_detections(Detection::Sentiment, 1);
                }
                Err(err) => record_failure(stats, &err),
            }
        }
    }
}

/// Lowercase alphanumeric characters of `raw` into `out`
fn normalize_word(raw: &str, out: &mut String) {
    out.clear();
    out.extend(
        raw.chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase),
    );
}

/// Deterministic unit vector derived from the word's FNV-1a hash
fn word_vector(word: &str) -> Vec<f32> {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in word.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    let mut rng = SmallRng::seed_from_u64(hash);
    let mut vector: Vec<f32> = (0..EMBEDDING_DIM).map(|_| rng.gen_range(-1.0f32..=1.0)).collect();
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt().max(f32::EPSILON);
    for value in vector.iter_mut() {
        *value /= norm;
    }
    vector
}

fn embedding(table: &[f32], id: usize) -> &[f32] {
    &table[id * EMBEDDING_DIM..(id + 1) * EMBEDDING_DIM]
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (na * nb).max(f32::EPSILON)
}

/// Fill `scores` with the closest words to `id`, best first in the leading slots
fn nearest_neighbors(table: &[f32], id: usize, scores: &mut Vec<(f32, usize)>) {
    scores.clear();
    let query = embedding(table, id);
    let count = table.len() / EMBEDDING_DIM;
    for other in (0..count).filter(|&other| other != id) {
        scores.push((cosine(query, embedding(table, other)), other));
    }
    if scores.len() > NEIGHBORS {
        scores.select_nth_unstable_by(NEIGHBORS, |a, b| b.0.total_cmp(&a.0));
    }
    let top = scores.len().min(NEIGHBORS);
    scores[..top].sort_by(|a, b| b.0.total_cmp(&a.0));
}

fn lexical_class(word: &str) -> LexicalClass {
    if word.ends_with("ly") {
        LexicalClass::Adverb
    } else if word.ends_with("ing") || word.ends_with("ed") || word.ends_with("ize") {
        LexicalClass::Verb
    } else if word.ends_with("ful") || word.ends_with("ous") || word.ends_with("ble") || word.ends_with("al") {
        LexicalClass::Adjective
    } else {
        LexicalClass::Noun
    }
}
