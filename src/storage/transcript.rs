use std::{
    collections::BTreeSet,
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::{CourseCode, CourseId, CourseRecord, Credits},
    solve::CoursePool,
};

/// A student's transcript: the course records one audit draws from.
///
/// Loaded from a versioned YAML file. Records without an explicit identity
/// are minted a fresh one at load time, so a repeated course code still
/// yields two distinct claimable instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    student: String,
    courses: Vec<CourseRecord>,
}

impl Transcript {
    /// Returns the student's display name.
    #[must_use]
    pub fn student(&self) -> &str {
        &self.student
    }

    /// Returns the course records in file order.
    #[must_use]
    pub fn courses(&self) -> &[CourseRecord] {
        &self.courses
    }

    /// Builds the course pool for solving.
    #[must_use]
    pub fn pool(&self) -> CoursePool {
        self.courses.iter().cloned().collect()
    }

    fn read<R: Read>(reader: &mut R) -> Result<Self, LoadError> {
        let file: TranscriptFile = serde_yaml::from_reader(reader)?;
        Ok(file.into())
    }

    fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let file = TranscriptFile {
            student: self.student.clone(),
            courses: self.courses.iter().map(CourseEntry::from).collect(),
        };
        let yaml = serde_yaml::to_string(&file).expect("this must never fail");
        writer.write_all(yaml.as_bytes())
    }

    /// Reads a transcript from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, or not a valid
    /// versioned transcript.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let file = File::open(path).map_err(|io_error| match io_error.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound,
            _ => LoadError::Io(io_error),
        })?;

        let mut reader = BufReader::new(file);
        let transcript = Self::read(&mut reader)?;
        tracing::debug!(
            student = %transcript.student,
            courses = transcript.courses.len(),
            "loaded transcript"
        );
        Ok(transcript)
    }

    /// Writes the transcript to a YAML file.
    ///
    /// Every record is written with its identity, so a load of the written
    /// file reproduces this transcript exactly. Parent directories are
    /// created automatically if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_path(&self, file_path: &Path) -> io::Result<()> {
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(file_path)?;
        let mut writer = BufWriter::new(file);
        self.write(&mut writer)
    }
}

/// Errors that can occur when loading a transcript.
#[derive(Debug, thiserror::Error)]
#[error("failed to read transcript")]
pub enum LoadError {
    /// The transcript file was not found.
    NotFound,
    /// An I/O error occurred.
    Io(#[from] io::Error),
    /// The YAML could not be parsed.
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(from = "TranscriptVersion")]
#[serde(into = "TranscriptVersion")]
struct TranscriptFile {
    student: String,
    courses: Vec<CourseEntry>,
}

/// One course as serialized in the transcript file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
struct CourseEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<Uuid>,
    #[serde(
        serialize_with = "code_as_string",
        deserialize_with = "code_from_string"
    )]
    code: CourseCode,
    term: String,
    #[serde(
        serialize_with = "credits_as_number",
        deserialize_with = "credits_from_number"
    )]
    credits: Credits,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    attributes: BTreeSet<String>,
}

fn code_as_string<S>(code: &CourseCode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&code.to_string())
}

fn code_from_string<'de, D>(deserializer: D) -> Result<CourseCode, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    CourseCode::from_str(&s).map_err(serde::de::Error::custom)
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn credits_as_number<S>(credits: &Credits, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(f64::from(credits.hundredths()) / 100.0)
}

fn credits_from_number<'de, D>(deserializer: D) -> Result<Credits, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Credits::try_from(value).map_err(serde::de::Error::custom)
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum TranscriptVersion {
    #[serde(rename = "1")]
    V1 {
        student: String,
        courses: Vec<CourseEntry>,
    },
}

impl From<TranscriptVersion> for TranscriptFile {
    fn from(version: TranscriptVersion) -> Self {
        match version {
            TranscriptVersion::V1 { student, courses } => Self { student, courses },
        }
    }
}

impl From<TranscriptFile> for TranscriptVersion {
    fn from(file: TranscriptFile) -> Self {
        let TranscriptFile { student, courses } = file;
        Self::V1 { student, courses }
    }
}

impl From<TranscriptFile> for Transcript {
    fn from(file: TranscriptFile) -> Self {
        Self {
            student: file.student,
            courses: file.courses.into_iter().map(CourseRecord::from).collect(),
        }
    }
}

impl From<CourseEntry> for CourseRecord {
    fn from(entry: CourseEntry) -> Self {
        let id = entry.id.map_or_else(CourseId::random, CourseId::from_uuid);
        Self::new(id, entry.code, entry.term, entry.credits, entry.attributes)
    }
}

impl From<&CourseRecord> for CourseEntry {
    fn from(record: &CourseRecord) -> Self {
        Self {
            id: Some(record.id().as_uuid()),
            code: record.code().clone(),
            term: record.term().to_string(),
            credits: record.credits(),
            attributes: record.attributes().clone(),
        }
    }
}
