/// Derive the identifier of the direct conversation between two users.
///
/// Symmetric: both argument orders produce the same identifier. The
/// lexicographically smaller id is length-prefixed, so two distinct
/// unordered pairs can never collide even when user ids contain the
/// separator character.
pub fn direct_conversation_id(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("d{}_{}{}", first.len(), first, second)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric() {
        assert_eq!(direct_conversation_id("u1", "u2"), direct_conversation_id("u2", "u1"));
        assert_eq!(direct_conversation_id("alice", "bob"), direct_conversation_id("bob", "alice"));
    }

    #[test]
    fn test_distinct_pairs_differ() {
        assert_ne!(direct_conversation_id("u1", "u2"), direct_conversation_id("u1", "u3"));
        assert_ne!(direct_conversation_id("a", "b"), direct_conversation_id("a", "c"));
    }

    #[test]
    fn test_no_collision_on_boundary_shift() {
        // Concatenation alone would make ("ab","c") and ("a","bc")
        // collide; the length prefix keeps them apart.
        assert_ne!(direct_conversation_id("ab", "c"), direct_conversation_id("a", "bc"));
    }

    #[test]
    fn test_separator_inside_ids() {
        assert_ne!(
            direct_conversation_id("u_1", "u2"),
            direct_conversation_id("u", "1_u2"),
        );
    }
}
