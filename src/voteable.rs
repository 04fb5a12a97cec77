use uuid::Uuid;

/// A question with a fixed set of answers and index-aligned vote tallies.
///
/// `votes[i]` is the tally for `answers[i]`; the two stay the same length
/// for the lifetime of the record. The id is assigned once at creation and
/// never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voteable {
    pub id: String,
    pub question: String,
    pub answers: Vec<String>,
    pub votes: Vec<i64>,
}

impl Voteable {
    /// Builds a new voteable with a fresh id and one zeroed counter per
    /// answer slot. Answer emptiness is deliberately not validated here.
    pub fn new(question: String, answers: Vec<String>) -> Self {
        let votes = vec![0; answers.len()];
        Self {
            id: Uuid::new_v4().to_string(),
            question,
            answers,
            votes,
        }
    }
}
