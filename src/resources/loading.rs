use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use failure::{bail, ResultExt};
use log::info;

use crate::config::PathsConfig;
use crate::errors::*;
use crate::resources::gazetteer::EntityGazetteer;
use crate::resources::lemmatizer::HashMapLemmatizer;
use crate::resources::spelling::SpellChecker;
use crate::resources::SharedResources;

pub fn load_shared_resources(paths: &PathsConfig) -> Result<Arc<SharedResources>> {
    let stop_words = load_stop_words(&paths.stopwords)?;
    let stop_word_set: HashSet<String> = stop_words.iter().cloned().collect();
    let contractions = load_contractions(&paths.contractions)?;
    let entity_gazetteer = load_entity_gazetteer(&paths.entities)?;
    let spell_checker = load_spell_checker(&paths.spelling)?;
    let lemmatizer = load_lemmatizer(&paths.lemmas)?;
    let word_similarities = load_word_similarities(&paths.word_similarities)?;

    Ok(Arc::new(SharedResources {
        stop_words,
        stop_word_set,
        contractions,
        entity_gazetteer,
        spell_checker,
        lemmatizer,
        word_similarities,
    }))
}

fn load_stop_words<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    info!("Loading stop words ({:?}) ...", path.as_ref());
    let file = File::open(&path)
        .with_context(|_| format!("Cannot open stop words file {:?}", path.as_ref()))?;
    let reader = BufReader::new(file);
    let mut stop_words = Vec::new();
    for line in reader.lines() {
        let stop_word = line?;
        let stop_word = stop_word.trim();
        if !stop_word.is_empty() {
            stop_words.push(stop_word.to_string());
        }
    }
    info!("Stop words loaded");
    Ok(stop_words)
}

fn load_contractions<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    info!("Loading contractions ({:?}) ...", path.as_ref());
    let file = File::open(&path)
        .with_context(|_| format!("Cannot open contractions file {:?}", path.as_ref()))?;
    let reader = BufReader::new(file);
    let mut contractions = HashMap::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(2, '=');
        match (parts.next(), parts.next()) {
            (Some(key), Some(value)) => {
                contractions.insert(key.to_string(), value.to_string());
            }
            _ => bail!("Malformed contraction line '{}'", line),
        }
    }
    info!("Contractions loaded");
    Ok(contractions)
}

fn load_entity_gazetteer<P: AsRef<Path>>(path: P) -> Result<EntityGazetteer> {
    info!("Loading entity gazetteer ({:?}) ...", path.as_ref());
    let file = File::open(&path)
        .with_context(|_| format!("Cannot open entity gazetteer file {:?}", path.as_ref()))?;
    let gazetteer = EntityGazetteer::from_reader(file)
        .with_context(|_| format!("Cannot read entity gazetteer file {:?}", path.as_ref()))?;
    info!("Entity gazetteer loaded");
    Ok(gazetteer)
}

fn load_spell_checker<P: AsRef<Path>>(path: P) -> Result<SpellChecker> {
    info!("Loading spelling dictionary ({:?}) ...", path.as_ref());
    let file = File::open(&path)
        .with_context(|_| format!("Cannot open spelling dictionary {:?}", path.as_ref()))?;
    let spell_checker = SpellChecker::from_reader(file)
        .with_context(|_| format!("Cannot read spelling dictionary {:?}", path.as_ref()))?;
    info!("Spelling dictionary loaded");
    Ok(spell_checker)
}

fn load_lemmatizer<P: AsRef<Path>>(path: P) -> Result<Arc<dyn crate::resources::Lemmatizer>> {
    info!("Loading lemma table ({:?}) ...", path.as_ref());
    let file = File::open(&path)
        .with_context(|_| format!("Cannot open lemma table {:?}", path.as_ref()))?;
    let lemmatizer = HashMapLemmatizer::from_reader(file)
        .with_context(|_| format!("Cannot read lemma table {:?}", path.as_ref()))?;
    info!("Lemma table loaded");
    Ok(Arc::new(lemmatizer))
}

fn load_word_similarities<P: AsRef<Path>>(path: P) -> Result<HashMap<String, Vec<String>>> {
    info!("Loading word similarities ({:?}) ...", path.as_ref());
    let file = File::open(&path)
        .with_context(|_| format!("Cannot open word similarities file {:?}", path.as_ref()))?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b',')
        .quoting(false)
        .flexible(true)
        .has_headers(false)
        .from_reader(file);
    let mut similarities = HashMap::new();
    for record in csv_reader.records() {
        let elements =
            record.with_context(|_| format!("Cannot read word similarities file {:?}", path.as_ref()))?;
        let word = elements[0].to_string();
        let related: Vec<String> = elements.iter().skip(1).map(|s| s.to_string()).collect();
        if !related.is_empty() {
            similarities.insert(word, related);
        }
    }
    info!("Word similarities loaded");
    Ok(similarities)
}
