use image::{DynamicImage, EncodableLayout, Luma, Pixel, PixelWithColorType, Primitive};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use stitching::{
    GridParameters, StageMetadata, StitchCommand, StitchError, StitchImages, StitchedCoordinates,
    Tile, TileImage, TileSet,
};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Stitch(#[from] StitchError),
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("Failed to read tile '{path}': {source}")]
    TileRead {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

impl JobError {
    /// Status code for the process exit and log line
    pub fn code(&self) -> i32 {
        match self {
            Self::Stitch(error) => error.code(),
            Self::TileRead { .. } => -11100,
            Self::SerdeError(_) | Self::TomlDeError(_) | Self::TomlSerError(_) => -11101,
            Self::IoError(_) => -11102,
            Self::UnsupportedFileFormat => -11103,
        }
    }
}

/// One tile image and, for the legacy import mode, its stage metadata
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TileEntry {
    pub path: PathBuf,
    /// Name reported in the coordinates output; defaults to the file name
    pub name: Option<String>,
    pub metadata: Option<StageMetadata>,
}

impl TileEntry {
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.display().to_string())
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct OutputPaths {
    /// Where to write the coordinates JSON
    pub coordinates: Option<PathBuf>,
    /// Where to write the montage image; the extension picks the format
    pub montage: Option<PathBuf>,
}

/// A stitching run: the tiles, the grid they form and what to do with them
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct StitchJob {
    pub tiles: Vec<TileEntry>,
    #[serde(flatten)]
    pub grid: GridParameters,
    pub command: StitchCommand,
    #[serde(default)]
    pub output: OutputPaths,
    /// Directory relative tile and output paths are resolved against
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

/// Tiles decoded at the bit depth they were stored with
#[derive(Debug, Clone)]
pub enum LoadedTiles {
    Gray8(TileSet<u8>),
    Gray16(TileSet<u16>),
}

impl LoadedTiles {
    pub fn len(&self) -> usize {
        match self {
            Self::Gray8(tiles) => tiles.len(),
            Self::Gray16(tiles) => tiles.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StitchJob {
    /// Load StitchJob configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, JobError> {
        let content = fs::read_to_string(&path)?;
        Ok(Self::from_toml(&content)?.with_base_dir(path))
    }

    pub fn from_toml(content: &str) -> Result<Self, JobError> {
        let job: StitchJob = toml::from_str(content)?;
        Ok(job)
    }

    /// Load StitchJob configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, JobError> {
        let content = fs::read_to_string(&path)?;
        Ok(Self::from_json(&content)?.with_base_dir(path))
    }

    pub fn from_json(content: &str) -> Result<Self, JobError> {
        let job: StitchJob = serde_json::from_str(content)?;
        Ok(job)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, JobError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(JobError::UnsupportedFileFormat),
        }
    }

    pub fn to_toml(&self) -> Result<String, JobError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    pub fn to_json(&self) -> Result<String, JobError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(StitchJob)
    }

    fn with_base_dir<P: AsRef<Path>>(mut self, config_path: P) -> Self {
        self.base_dir = config_path.as_ref().parent().map(Path::to_path_buf);
        self
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Decode every tile. All tiles must share one bit depth.
    pub fn load_tiles(&self) -> Result<LoadedTiles, JobError> {
        let images = self
            .tiles
            .iter()
            .map(|entry| {
                let path = self.resolve(&entry.path);
                image::open(&path)
                    .map(|image| (entry, image))
                    .map_err(|source| JobError::TileRead { path, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let Some((first_entry, first_image)) = images.first() else {
            return Err(StitchError::EmptyTileSet.into());
        };
        let depth = bytes_per_channel(first_image);

        for (entry, image) in &images {
            if bytes_per_channel(image) != depth {
                return Err(StitchError::UnsupportedPixelType(format!(
                    "tile '{}' is {}-bit but tile '{}' is {}-bit",
                    entry.display_name(),
                    bytes_per_channel(image) * 8,
                    first_entry.display_name(),
                    depth * 8
                ))
                .into());
            }
        }

        match depth {
            1 => Ok(LoadedTiles::Gray8(
                images
                    .into_iter()
                    .map(|(entry, image)| to_tile(entry, image.into_luma8()))
                    .collect(),
            )),
            2 => Ok(LoadedTiles::Gray16(
                images
                    .into_iter()
                    .map(|(entry, image)| to_tile(entry, image.into_luma16()))
                    .collect(),
            )),
            _ => Err(StitchError::UnsupportedPixelType(format!(
                "{:?} tiles are not supported, use 8- or 16-bit images",
                first_image.color()
            ))
            .into()),
        }
    }

    /// Coordinates-only variant of the job's command
    pub fn coordinates_command(&self) -> StitchCommand {
        match self.command {
            StitchCommand::DetermineCoordinates { .. } => self.command.clone(),
            StitchCommand::StitchImages {
                use_legacy_metadata,
                interior_blend,
            } => StitchCommand::DetermineCoordinates {
                import_mode: StitchImages::new(self.grid, use_legacy_metadata).import_mode(),
                interior_blend,
            },
        }
    }

    /// Run `command` over the job's tiles and write whatever outputs are configured
    pub fn run_command(&self, command: &StitchCommand) -> Result<StitchedCoordinates, JobError> {
        info!(command = %command, tiles = self.tiles.len(), "{}", command.description());
        match self.load_tiles()? {
            LoadedTiles::Gray8(tiles) => self.run_on(command, &tiles),
            LoadedTiles::Gray16(tiles) => self.run_on(command, &tiles),
        }
    }

    pub fn run(&self) -> Result<StitchedCoordinates, JobError> {
        self.run_command(&self.command)
    }

    fn run_on<T>(&self, command: &StitchCommand, tiles: &TileSet<T>) -> Result<StitchedCoordinates, JobError>
    where
        T: Primitive + Send + Sync,
        Luma<T>: PixelWithColorType + Pixel<Subpixel = T>,
        [T]: EncodableLayout,
    {
        command.preflight(self.grid, tiles)?;
        let output = command.run(self.grid, tiles)?;

        if let Some(path) = &self.output.coordinates {
            let path = self.resolve(path);
            output.coordinates.save_json(&path)?;
            info!(path = %path.display(), "Wrote stitching coordinates");
        }

        match (&output.montage, &self.output.montage) {
            (Some(montage), Some(path)) => montage.save(self.resolve(path))?,
            (Some(_), None) => warn!("No montage output path configured, montage discarded"),
            _ => {}
        }

        Ok(output.coordinates)
    }
}

fn bytes_per_channel(image: &DynamicImage) -> u8 {
    let color = image.color();
    color.bytes_per_pixel() / color.channel_count()
}

fn to_tile<T: Primitive>(entry: &TileEntry, image: TileImage<T>) -> Tile<T> {
    let tile = Tile::new(entry.display_name(), image);
    match &entry.metadata {
        Some(metadata) => tile.with_metadata(metadata.clone()),
        None => tile,
    }
}
