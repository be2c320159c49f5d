use std::io::{BufRead, BufReader, Read};

use failure::bail;

use crate::errors::*;
use crate::utils::EntityName;

/// A named group of literal phrases, e.g. all known table names.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityGroup {
    pub name: EntityName,
    pub phrases: Vec<String>,
}

/// Domain entity vocabulary seeding the phrase matcher.
///
/// Line format: a line ending in `:` opens a named group, subsequent lines
/// starting with `- ` are literal phrases of that group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityGazetteer {
    pub groups: Vec<EntityGroup>,
}

impl EntityGazetteer {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let reader = BufReader::new(reader);
        let mut groups: Vec<EntityGroup> = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.ends_with(':') {
                groups.push(EntityGroup {
                    name: line[..line.len() - 1].to_string(),
                    phrases: Vec::new(),
                });
            } else if line.starts_with("- ") {
                match groups.last_mut() {
                    Some(group) => group.phrases.push(line[2..].to_string()),
                    None => bail!("Entity phrase '{}' appears before any group header", line),
                }
            }
        }
        Ok(Self { groups })
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_groups_and_phrases() {
        // Given
        let gazetteer: &[u8] = r#"
Tabelle:
- Bestellungen
- Verkaufszeile

Feld:
- Belegnummer
"#
        .as_ref();

        // When
        let gazetteer = EntityGazetteer::from_reader(gazetteer).unwrap();

        // Then
        assert_eq!(2, gazetteer.groups.len());
        assert_eq!("Tabelle", gazetteer.groups[0].name);
        assert_eq!(
            vec!["Bestellungen", "Verkaufszeile"],
            gazetteer.groups[0].phrases
        );
        assert_eq!(vec!["Belegnummer"], gazetteer.groups[1].phrases);
    }

    #[test]
    fn phrase_without_group_header_fails() {
        // Given
        let gazetteer: &[u8] = "- Bestellungen\n".as_ref();

        // When
        let result = EntityGazetteer::from_reader(gazetteer);

        // Then
        assert!(result.is_err());
    }
}
