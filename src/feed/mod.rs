use serde::de::DeserializeOwned;
use std::{
    fs::File,
    io::{self},
    path::PathBuf,
};
use thiserror::Error;
use zip::{ZipArchive, read::ZipFile};

mod config;
pub mod models;
pub use config::*;
pub use models::*;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Csv file {0} is missing header")]
    MissingHeader(String),
    #[error("Could not find file with name: {0}")]
    FileNotFound(String),
}

#[derive(Default)]
pub enum StorageType {
    #[default]
    None,
    Zip(PathBuf),
}

/// A zipped timetable feed: stops, lines and per-run calls, each a csv
/// member of the archive. Records are streamed to a callback so the whole
/// feed never has to sit in memory at once.
#[derive(Default)]
pub struct Feed {
    config: Config,
    storage: StorageType,
}

impl Feed {
    pub fn new(config: self::Config) -> Self {
        Self {
            config,
            storage: Default::default(),
        }
    }

    pub fn from_zip(mut self, path: PathBuf) -> Self {
        self.storage = StorageType::Zip(path);
        self
    }

    pub fn stream_stops<F>(&self, f: F) -> Result<(), self::Error>
    where
        F: FnMut((usize, FeedStop)),
    {
        match &self.storage {
            StorageType::None => Ok(()),
            StorageType::Zip(path) => {
                stream_from_zip::<FeedStop, F>(path, &self.config.stops_path, f)
            }
        }
    }

    pub fn stream_lines<F>(&self, f: F) -> Result<(), self::Error>
    where
        F: FnMut((usize, FeedLine)),
    {
        match &self.storage {
            StorageType::None => Ok(()),
            StorageType::Zip(path) => {
                stream_from_zip::<FeedLine, F>(path, &self.config.lines_path, f)
            }
        }
    }

    pub fn stream_calls<F>(&self, f: F) -> Result<(), self::Error>
    where
        F: FnMut((usize, FeedCall)),
    {
        match &self.storage {
            StorageType::None => Ok(()),
            StorageType::Zip(path) => {
                stream_from_zip::<FeedCall, F>(path, &self.config.calls_path, f)
            }
        }
    }
}

fn stream_from_zip<T, F>(zip_path: &PathBuf, file_name: &str, f: F) -> Result<(), self::Error>
where
    T: DeserializeOwned,
    F: FnMut((usize, T)),
{
    let zip_file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(zip_file)?;
    let file = get_file(&mut archive, file_name)?;
    let mut reader = csv::Reader::from_reader(file);
    if reader.headers()?.is_empty() {
        return Err(self::Error::MissingHeader(file_name.to_string()));
    }
    reader
        .deserialize()
        .filter_map(|a| a.ok())
        .enumerate()
        .for_each(f);
    Ok(())
}

fn get_file<'a>(
    archive: &'a mut ZipArchive<File>,
    name: &'a str,
) -> Result<ZipFile<'a, File>, self::Error> {
    let index = archive
        .index_for_name(name)
        .ok_or(self::Error::FileNotFound(name.to_string()))?;
    let file = archive.by_index(index)?;
    Ok(file)
}
