use std::collections::HashMap;

use crate::error::{Result, RnnError};

/// Bidirectional token/id mapping with ids assigned by first occurrence.
#[derive(Clone, Debug, PartialEq)]
pub struct Vocabulary {
    token_to_id: HashMap<String, usize>,
    id_to_token: Vec<String>,
}

impl Vocabulary {
    pub fn build<S: AsRef<str>>(tokens: &[S]) -> Result<Self> {
        if tokens.is_empty() {
            return Err(RnnError::Config("cannot build a vocabulary from an empty token sequence".into()));
        }
        let mut token_to_id = HashMap::new();
        let mut id_to_token = Vec::new();
        for t in tokens.iter().map(AsRef::as_ref) {
            if !token_to_id.contains_key(t) {
                token_to_id.insert(t.to_string(), id_to_token.len());
                id_to_token.push(t.to_string());
            }
        }
        Ok(Vocabulary { token_to_id, id_to_token })
    }

    /// Rebuilds from an id-ordered token list, rejecting duplicates and empty lists.
    pub fn from_ordered(id_to_token: Vec<String>) -> Result<Self> {
        if id_to_token.is_empty() {
            return Err(RnnError::Artifact("vocabulary is empty".into()));
        }
        let mut token_to_id = HashMap::with_capacity(id_to_token.len());
        for (id, t) in id_to_token.iter().enumerate() {
            if token_to_id.insert(t.clone(), id).is_some() {
                return Err(RnnError::Artifact(format!("duplicate vocabulary token {:?}", t)));
            }
        }
        Ok(Vocabulary { token_to_id, id_to_token })
    }

    pub fn len(&self) -> usize { self.id_to_token.len() }

    pub fn is_empty(&self) -> bool { self.id_to_token.is_empty() }

    pub fn id(&self, token: &str) -> Option<usize> { self.token_to_id.get(token).copied() }

    pub fn token(&self, id: usize) -> Option<&str> { self.id_to_token.get(id).map(String::as_str) }

    pub fn tokens(&self) -> &[String] { &self.id_to_token }

    /// Maps tokens to ids, dropping tokens the vocabulary has never seen.
    pub fn encode<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<usize> {
        tokens.iter().filter_map(|t| self.id(t.as_ref())).collect()
    }

    /// Unknown ids render as empty strings.
    pub fn decode(&self, ids: &[usize]) -> Vec<String> {
        ids.iter().map(|&i| self.token(i).unwrap_or("").to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_occurrence_order() {
        let v = Vocabulary::build(&["A", "B", "A", "C"]).unwrap();
        assert_eq!(v.len(), 3);
        assert_eq!(v.id("A"), Some(0));
        assert_eq!(v.id("B"), Some(1));
        assert_eq!(v.id("C"), Some(2));
        assert_eq!(v.token(2), Some("C"));
    }

    #[test]
    fn test_empty_is_config_error() {
        let empty: [&str; 0] = [];
        assert!(matches!(Vocabulary::build(&empty), Err(RnnError::Config(_))));
    }

    #[test]
    fn test_encode_drops_unknown() {
        let v = Vocabulary::build(&["hello", "world"]).unwrap();
        assert_eq!(v.encode(&["hello", "there", "world"]), vec![0, 1]);
    }

    #[test]
    fn test_decode_unknown_is_empty() {
        let v = Vocabulary::build(&["x"]).unwrap();
        assert_eq!(v.decode(&[0, 7]), vec!["x".to_string(), String::new()]);
    }

    #[test]
    fn test_from_ordered_rejects_duplicates() {
        let res = Vocabulary::from_ordered(vec!["a".into(), "b".into(), "a".into()]);
        assert!(matches!(res, Err(RnnError::Artifact(_))));
        assert!(Vocabulary::from_ordered(Vec::new()).is_err());
    }
}
