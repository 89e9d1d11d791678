//! Command execution with builder pattern.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use plyr_data::{
    BindingTable, DataType, DataWalker, Header, ListCapacity, PlyError, PropertyBuffer, Scalar,
};
use tracing::{debug, info};

use crate::errors::AppError;

/// Logging configuration.
pub struct LoggingConfig {
    pub level: String,
    pub enable_tracy: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_tracy: false,
        }
    }
}

/// What `plyr extract` pulls out of a file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractConfig {
    pub element: String,
    pub properties: Vec<String>,
    /// Destination type for every property; each property's own type if unset.
    pub data_type: Option<DataType>,
    /// Maximum number of rows to print.
    pub limit: Option<usize>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            element: "vertex".to_string(),
            properties: vec!["x".to_string(), "y".to_string(), "z".to_string()],
            data_type: None,
            limit: None,
        }
    }
}

/// Command to run.
pub enum Command {
    Info { path: PathBuf, json: bool },
    Extract { path: PathBuf, config: ExtractConfig },
}

/// Builder for configuring and running a command.
pub struct AppBuilder {
    logging: LoggingConfig,
    command: Option<Command>,
}

impl AppBuilder {
    /// Create a new AppBuilder with default settings.
    pub fn new() -> Self {
        Self {
            logging: LoggingConfig::default(),
            command: None,
        }
    }

    /// Configure logging.
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging = config;
        self
    }

    pub fn with_command(mut self, command: Command) -> Self {
        self.command = Some(command);
        self
    }

    /// Run the configured command, writing to stdout.
    pub fn run(self) -> Result<(), AppError> {
        self.init_logging();

        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        match self.command {
            Some(Command::Info { path, json }) => write_info(&path, json, &mut out),
            Some(Command::Extract { path, config }) => write_extract(&path, &config, &mut out),
            None => Err(AppError::NoCommand),
        }
    }

    fn init_logging(&self) {
        #[cfg(feature = "tracy")]
        {
            if self.logging.enable_tracy {
                use tracing_subscriber::Layer;
                use tracing_subscriber::layer::SubscriberExt;
                use tracing_subscriber::util::SubscriberInitExt;
                tracing_subscriber::registry()
                    .with(tracing_tracy::TracyLayer::default())
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_writer(std::io::stderr)
                            .with_filter(
                                tracing_subscriber::EnvFilter::try_from_default_env()
                                    .unwrap_or_else(|_| self.logging.level.clone().into()),
                            ),
                    )
                    .init();
                return;
            }
        }

        // Logs go to stderr so extracted rows can be piped.
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&self.logging.level)),
            )
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Print the header of `path` as PLY text or JSON.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn write_info<W: Write>(path: &Path, json: bool, out: &mut W) -> Result<(), AppError> {
    let header = plyr_data::read_header(path)?;
    if json {
        serde_json::to_writer_pretty(&mut *out, &header)?;
        writeln!(out)?;
    } else {
        write!(out, "{}", header)?;
    }
    info!(
        "{} elements, {} comments",
        header.elements.len(),
        header.comments.len()
    );
    Ok(())
}

/// Decode the configured properties and print one ASCII PLY row per instance.
///
/// List properties are printed as their length followed by the values.
#[tracing::instrument(skip_all, fields(path = %path.display(), element = %config.element))]
pub fn write_extract<W: Write>(
    path: &Path,
    config: &ExtractConfig,
    out: &mut W,
) -> Result<(), AppError> {
    let mut reader = BufReader::new(File::open(path)?);
    let header = Header::parse(&mut reader)?;
    let element = header
        .element(&config.element)
        .ok_or_else(|| PlyError::UnknownElement(config.element.clone()))?;

    let mut bindings = BindingTable::new();
    let mut columns = Vec::with_capacity(config.properties.len());
    for name in &config.properties {
        let property = element
            .property(name)
            .ok_or_else(|| PlyError::UnknownProperty {
                element: element.name.clone(),
                property: name.clone(),
            })?;
        let data_type = config.data_type.unwrap_or(property.data_type);
        let id = if property.is_list() {
            bindings.bind_list(
                &header,
                &element.name,
                name,
                data_type,
                ListCapacity::Growable,
            )?
        } else {
            bindings.bind_scalars(&header, &element.name, &[name.as_str()], data_type)?
        };
        columns.push((id, property.is_list()));
    }

    DataWalker::new(&header).read(&mut reader, &mut bindings)?;

    let columns: Vec<Column> = columns
        .into_iter()
        .map(|(id, is_list)| Column::new(bindings.take(id), is_list))
        .collect();
    let rows = config
        .limit
        .map_or(element.count, |limit| limit.min(element.count));
    debug!("Printing {} of {} rows", rows, element.count);

    for row in 0..rows {
        let fields: Vec<String> = columns.iter().map(|c| c.format(row)).collect();
        writeln!(out, "{}", fields.join(" "))?;
    }
    Ok(())
}

/// A decoded property ready to be printed row by row.
enum Column {
    Scalar(PropertyBuffer),
    List(Vec<Vec<Scalar>>),
}

impl Column {
    fn new(buffer: PropertyBuffer, is_list: bool) -> Self {
        if is_list {
            Column::List(buffer.lists().collect())
        } else {
            Column::Scalar(buffer)
        }
    }

    fn format(&self, row: usize) -> String {
        match self {
            Column::Scalar(buffer) => buffer
                .get(row)
                .map(|value| value.to_string())
                .unwrap_or_default(),
            Column::List(lists) => {
                let list = lists.get(row).map(Vec::as_slice).unwrap_or_default();
                let mut text = list.len().to_string();
                for value in list {
                    text.push(' ');
                    text.push_str(&value.to_string());
                }
                text
            }
        }
    }
}
