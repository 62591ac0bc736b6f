use std::collections::HashMap;

/// Hands out table aliases: the entity's lower-cased initial, a counter per
/// initial and the table's position within the entity (always `_0`, entities
/// map to a single table).
#[derive(Debug, Default)]
pub(super) struct AliasGenerator {
    counters: HashMap<char, usize>,
}

impl AliasGenerator {
    pub(super) fn next(&mut self, entity: &str) -> String {
        let stem = entity
            .chars()
            .find(char::is_ascii_alphabetic)
            .map(|c| c.to_ascii_lowercase())
            .unwrap_or('t');

        let counter = self.counters.entry(stem).or_default();
        *counter += 1;
        format!("{stem}{counter}_0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_per_initial() {
        let mut aliases = AliasGenerator::default();
        assert_eq!(aliases.next("Person"), "p1_0");
        assert_eq!(aliases.next("Employer"), "e1_0");
        assert_eq!(aliases.next("Person"), "p2_0");
        assert_eq!(aliases.next("Pet"), "p3_0");
        assert_eq!(aliases.next("_"), "t1_0");
    }
}
