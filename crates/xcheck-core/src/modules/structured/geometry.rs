use crate::domain::{XcheckError, XcheckResult};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

const GEOMETRY_MAGIC: &str = "D6GARLZ!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileDirection {
    X,
    Y,
}

impl ProfileDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::X => "X",
            Self::Y => "Y",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridElement {
    pub index: usize,
    pub i: usize,
    pub j: usize,
    pub k: Option<usize>,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A 1-D cut through the element grid, one entry per selected element.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileCut {
    pub direction: ProfileDirection,
    pub coordinates: Vec<f64>,
    pub steps: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeometryModel {
    version: u8,
    x_steps: Vec<f64>,
    y_steps: Vec<f64>,
    z_steps: Vec<f64>,
    elements: Vec<GridElement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    None,
    Materials,
    Grid,
    Elements,
    Sides,
    Unknown,
}

impl GeometryModel {
    pub fn read(path: impl AsRef<Path>) -> XcheckResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| {
            XcheckError::parse(
                "PARSE.GEOMETRY_READ",
                format!("failed to read geometry file '{}': {}", path.display(), source),
            )
        })?;
        Self::parse_str(&source, &path.display().to_string())
    }

    pub fn parse_str(source: &str, origin: &str) -> XcheckResult<Self> {
        let mut lines = source
            .lines()
            .enumerate()
            .map(|(index, line)| (index + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());

        let version = lines
            .next()
            .and_then(|(_, line)| magic_version(line, GEOMETRY_MAGIC))
            .ok_or_else(|| {
                XcheckError::parse(
                    "PARSE.GEOMETRY_MAGIC",
                    format!("{}: not a geometry file of version 6 or 7", origin),
                )
            })?;

        let mut table = Table::None;
        let mut grid_rows: Vec<Vec<f64>> = Vec::new();
        let mut elements = Vec::new();
        for (line_number, line) in lines {
            if let Some(name) = line.strip_prefix("TABLE") {
                table = match name.trim() {
                    "MATERIALS" => Table::Materials,
                    "GRID" => Table::Grid,
                    "ELEMENT_GEOMETRY" => Table::Elements,
                    "SIDES_GEOMETRY" => Table::Sides,
                    "" => {
                        return Err(XcheckError::parse(
                            "PARSE.GEOMETRY_TABLE",
                            format!("{}: table without name at line {}", origin, line_number),
                        ));
                    }
                    _ => Table::Unknown,
                };
                continue;
            }

            match table {
                Table::Grid if grid_rows.len() < 3 => {
                    let steps = line
                        .split_whitespace()
                        .map(|token| parse_token::<f64>(token, origin, line_number))
                        .collect::<XcheckResult<Vec<_>>>()?;
                    grid_rows.push(steps);
                }
                Table::Elements => elements.push(parse_element(line, origin, line_number)?),
                Table::None | Table::Materials | Table::Grid | Table::Sides | Table::Unknown => {}
            }
        }

        let [x_steps, y_steps, z_steps]: [Vec<f64>; 3] = grid_rows.try_into().map_err(|_| {
            XcheckError::parse(
                "PARSE.GEOMETRY_GRID",
                format!("{}: GRID table must list x, y and z step widths", origin),
            )
        })?;
        if z_steps.len() != 1 {
            return Err(XcheckError::parse(
                "PARSE.GEOMETRY_GRID",
                format!(
                    "{}: exactly one z step is supported, found {}",
                    origin,
                    z_steps.len()
                ),
            ));
        }

        Ok(Self {
            version,
            x_steps,
            y_steps,
            z_steps,
            elements,
        })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn x_steps(&self) -> &[f64] {
        &self.x_steps
    }

    pub fn y_steps(&self) -> &[f64] {
        &self.y_steps
    }

    pub fn z_steps(&self) -> &[f64] {
        &self.z_steps
    }

    pub fn elements(&self) -> &[GridElement] {
        &self.elements
    }

    pub fn element(&self, index: usize) -> XcheckResult<&GridElement> {
        self.elements.get(index).ok_or_else(|| {
            XcheckError::parse(
                "PARSE.GEOMETRY_ELEMENT",
                format!(
                    "element index {} is not in the geometry ({} elements)",
                    index,
                    self.elements.len()
                ),
            )
        })
    }

    pub fn coordinates_in_profile_cut(
        &self,
        element_indices: &[usize],
        axis: Axis,
    ) -> XcheckResult<Vec<f64>> {
        element_indices
            .iter()
            .map(|index| {
                self.element(*index).map(|element| match axis {
                    Axis::X => element.x,
                    Axis::Y => element.y,
                    Axis::Z => element.z,
                })
            })
            .collect()
    }

    /// Classifies the selection as a cut along x (shared `j`) or y (shared `i`).
    pub fn profile_cut(&self, element_indices: &[usize]) -> XcheckResult<ProfileCut> {
        let elements = element_indices
            .iter()
            .map(|index| self.element(*index))
            .collect::<XcheckResult<Vec<_>>>()?;
        let i_values = elements.iter().map(|element| element.i).collect::<BTreeSet<_>>();
        let j_values = elements.iter().map(|element| element.j).collect::<BTreeSet<_>>();

        let (direction, axis) = if j_values.len() <= 1 {
            (ProfileDirection::X, Axis::X)
        } else if i_values.len() <= 1 {
            (ProfileDirection::Y, Axis::Y)
        } else {
            return Err(XcheckError::parse(
                "PARSE.PROFILE_CUT_AXES",
                format!(
                    "selected elements span {} columns and {} rows; only 1-D profile cuts are supported",
                    i_values.len(),
                    j_values.len()
                ),
            ));
        };

        let steps = elements
            .iter()
            .map(|element| {
                let (table, grid_index) = match direction {
                    ProfileDirection::X => (&self.x_steps, element.i),
                    ProfileDirection::Y => (&self.y_steps, element.j),
                };
                table.get(grid_index).copied().ok_or_else(|| {
                    XcheckError::parse(
                        "PARSE.GEOMETRY_GRID",
                        format!(
                            "element {} has grid index {} outside the {} {} steps",
                            element.index,
                            grid_index,
                            table.len(),
                            direction.as_str()
                        ),
                    )
                })
            })
            .collect::<XcheckResult<Vec<_>>>()?;

        Ok(ProfileCut {
            direction,
            coordinates: self.coordinates_in_profile_cut(element_indices, axis)?,
            steps,
        })
    }
}

/// Geometry models keyed by path, kept for the lifetime of a batch run.
#[derive(Debug, Default)]
pub struct GeometryStore {
    models: HashMap<PathBuf, Arc<GeometryModel>>,
}

impl GeometryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&mut self, path: impl AsRef<Path>) -> XcheckResult<Arc<GeometryModel>> {
        let path = path.as_ref();
        if let Some(model) = self.models.get(path) {
            debug!("Geometry cache hit: {}", path.display());
            return Ok(Arc::clone(model));
        }

        let model = Arc::new(GeometryModel::read(path)?);
        self.models.insert(path.to_path_buf(), Arc::clone(&model));
        Ok(model)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

pub(super) fn magic_version(line: &str, magic: &str) -> Option<u8> {
    let rest = line.trim().strip_prefix(magic)?.trim_start();
    if rest.starts_with("006.") {
        Some(6)
    } else if rest.starts_with("007.") {
        Some(7)
    } else {
        None
    }
}

pub(super) fn parse_token<T: FromStr>(token: &str, origin: &str, line: usize) -> XcheckResult<T> {
    token.parse::<T>().map_err(|_| {
        XcheckError::parse(
            "PARSE.NUMERIC_TOKEN",
            format!("{}: invalid number '{}' at line {}", origin, token, line),
        )
    })
}

fn parse_element(line: &str, origin: &str, line_number: usize) -> XcheckResult<GridElement> {
    let tokens = line.split_whitespace().collect::<Vec<_>>();
    match tokens.len() {
        // index x y i j material
        6 => Ok(GridElement {
            index: parse_token(tokens[0], origin, line_number)?,
            x: parse_token(tokens[1], origin, line_number)?,
            y: parse_token(tokens[2], origin, line_number)?,
            z: 0.0,
            i: parse_token(tokens[3], origin, line_number)?,
            j: parse_token(tokens[4], origin, line_number)?,
            k: None,
        }),
        // index x y z i j k [material]
        count if count >= 7 => Ok(GridElement {
            index: parse_token(tokens[0], origin, line_number)?,
            x: parse_token(tokens[1], origin, line_number)?,
            y: parse_token(tokens[2], origin, line_number)?,
            z: parse_token(tokens[3], origin, line_number)?,
            i: parse_token(tokens[4], origin, line_number)?,
            j: parse_token(tokens[5], origin, line_number)?,
            k: Some(parse_token(tokens[6], origin, line_number)?),
        }),
        count => Err(XcheckError::parse(
            "PARSE.GEOMETRY_ELEMENT",
            format!(
                "{}: element row at line {} has {} tokens, expected 6 or 7",
                origin, line_number, count
            ),
        )),
    }
}
