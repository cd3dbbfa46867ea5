//! Level file format
//!
//! A level is stored as a RON document listing object templates. Each
//! template names an object kind and carries its construction parameters as
//! typed properties. An [`ObjectFactory`] turns templates into detached
//! objects ready to be added to a [`LevelData`](crate::LevelData).
//!
//! ```ron
//! LevelFile(
//!     name: "demo",
//!     objects: [
//!         ObjectTemplate(
//!             type: "Wall",
//!             name: "floor",
//!             properties: {
//!                 "points": Points([(-10.0, 0.0), (10.0, 0.0)]),
//!             },
//!         ),
//!     ],
//! )
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::Path;

use flatland_math::Vec2;
use serde::{Deserialize, Serialize};

use crate::object::GameObject;

/// A serializable level
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelFile {
    /// Level name (for display/debugging)
    pub name: String,
    /// Objects in this level, in load order
    pub objects: Vec<ObjectTemplate>,
}

impl LevelFile {
    /// Create an empty level file
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Vec::new(),
        }
    }

    /// Load a level from a RON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LevelLoadError> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse a level from RON text
    pub fn parse(contents: &str) -> Result<Self, LevelLoadError> {
        let level = ron::from_str(contents)?;
        Ok(level)
    }

    /// Save a level to a RON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), LevelSaveError> {
        let contents = self.to_ron_string()?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Serialize to pretty RON text
    pub fn to_ron_string(&self) -> Result<String, LevelSaveError> {
        let pretty = ron::ser::PrettyConfig::new()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Add an object template to this level
    pub fn add_object(&mut self, object: ObjectTemplate) {
        self.objects.push(object);
    }
}

/// A typed construction parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Property {
    Bool(bool),
    Number(f32),
    Point([f32; 2]),
    Points(Vec<[f32; 2]>),
    Text(String),
}

impl Property {
    fn kind(&self) -> &'static str {
        match self {
            Property::Bool(_) => "Bool",
            Property::Number(_) => "Number",
            Property::Point(_) => "Point",
            Property::Points(_) => "Points",
            Property::Text(_) => "Text",
        }
    }
}

impl From<bool> for Property {
    fn from(value: bool) -> Self {
        Property::Bool(value)
    }
}

impl From<f32> for Property {
    fn from(value: f32) -> Self {
        Property::Number(value)
    }
}

impl From<Vec2> for Property {
    fn from(value: Vec2) -> Self {
        Property::Point(value.to_array())
    }
}

impl From<&[Vec2]> for Property {
    fn from(value: &[Vec2]) -> Self {
        Property::Points(value.iter().map(|p| p.to_array()).collect())
    }
}

impl From<&str> for Property {
    fn from(value: &str) -> Self {
        Property::Text(value.to_string())
    }
}

/// Serializable description of one object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectTemplate {
    /// Object kind, matched against the factory's registered constructors
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub depth: i32,
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
}

impl ObjectTemplate {
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            depth: 0,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_depth(mut self, depth: i32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Property>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    fn missing(&self, key: &str) -> TemplateError {
        TemplateError::MissingProperty {
            type_name: self.type_name.clone(),
            property: key.to_string(),
        }
    }

    fn invalid(&self, key: &str, reason: impl Into<String>) -> TemplateError {
        TemplateError::InvalidProperty {
            type_name: self.type_name.clone(),
            property: key.to_string(),
            reason: reason.into(),
        }
    }

    fn wrong_kind(&self, key: &str, expected: &str, found: &Property) -> TemplateError {
        self.invalid(key, format!("expected {}, found {}", expected, found.kind()))
    }

    /// Required finite number
    pub fn number(&self, key: &str) -> Result<f32, TemplateError> {
        match self.properties.get(key) {
            Some(Property::Number(value)) if value.is_finite() => Ok(*value),
            Some(Property::Number(_)) => Err(self.invalid(key, "not a finite number")),
            Some(other) => Err(self.wrong_kind(key, "Number", other)),
            None => Err(self.missing(key)),
        }
    }

    /// Optional finite number
    pub fn number_or(&self, key: &str, default: f32) -> Result<f32, TemplateError> {
        if self.properties.contains_key(key) {
            self.number(key)
        } else {
            Ok(default)
        }
    }

    /// Required point
    pub fn point(&self, key: &str) -> Result<Vec2, TemplateError> {
        match self.properties.get(key) {
            Some(Property::Point(value)) => Ok(Vec2::from_array(*value)),
            Some(other) => Err(self.wrong_kind(key, "Point", other)),
            None => Err(self.missing(key)),
        }
    }

    /// Optional point
    pub fn point_or(&self, key: &str, default: Vec2) -> Result<Vec2, TemplateError> {
        if self.properties.contains_key(key) {
            self.point(key)
        } else {
            Ok(default)
        }
    }

    /// Required point list
    pub fn points(&self, key: &str) -> Result<Vec<Vec2>, TemplateError> {
        match self.properties.get(key) {
            Some(Property::Points(values)) => {
                Ok(values.iter().copied().map(Vec2::from_array).collect())
            }
            Some(other) => Err(self.wrong_kind(key, "Points", other)),
            None => Err(self.missing(key)),
        }
    }

    /// Optional flag
    pub fn flag_or(&self, key: &str, default: bool) -> Result<bool, TemplateError> {
        match self.properties.get(key) {
            Some(Property::Bool(value)) => Ok(*value),
            Some(other) => Err(self.wrong_kind(key, "Bool", other)),
            None => Ok(default),
        }
    }

    /// Optional text
    pub fn text_or<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str, TemplateError> {
        match self.properties.get(key) {
            Some(Property::Text(value)) => Ok(value.as_str()),
            Some(other) => Err(self.wrong_kind(key, "Text", other)),
            None => Ok(default),
        }
    }

    /// Error for a property whose value is the right kind but unusable
    pub fn invalid_property(&self, key: &str, reason: impl Into<String>) -> TemplateError {
        self.invalid(key, reason)
    }
}

/// Builds an object from its template
pub type ObjectConstructor = fn(&ObjectTemplate) -> Result<Box<dyn GameObject>, TemplateError>;

/// Maps template type names to object constructors
#[derive(Clone, Default)]
pub struct ObjectFactory {
    constructors: HashMap<String, ObjectConstructor>,
}

impl ObjectFactory {
    /// A factory with no kinds registered
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory knowing every built-in object kind
    pub fn with_builtin() -> Self {
        let mut factory = Self::new();
        crate::objects::register_builtin(&mut factory);
        factory
    }

    /// Register a constructor, replacing any previous one for `type_name`
    pub fn register(&mut self, type_name: impl Into<String>, constructor: ObjectConstructor) {
        let type_name = type_name.into();
        if self.constructors.insert(type_name.clone(), constructor).is_some() {
            log::debug!("Replaced object constructor for {}", type_name);
        }
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    /// Build a detached object from a template
    pub fn create(&self, template: &ObjectTemplate) -> Result<Box<dyn GameObject>, TemplateError> {
        let constructor = self
            .constructors
            .get(&template.type_name)
            .ok_or_else(|| TemplateError::UnknownType(template.type_name.clone()))?;
        constructor(template)
    }
}

/// Error loading a level file
#[derive(Debug)]
pub enum LevelLoadError {
    /// IO error (file not found, permission denied, etc.)
    Io(io::Error),
    /// Parse error (invalid RON syntax or structure)
    Parse(ron::error::SpannedError),
}

impl From<io::Error> for LevelLoadError {
    fn from(e: io::Error) -> Self {
        LevelLoadError::Io(e)
    }
}

impl From<ron::error::SpannedError> for LevelLoadError {
    fn from(e: ron::error::SpannedError) -> Self {
        LevelLoadError::Parse(e)
    }
}

impl std::fmt::Display for LevelLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LevelLoadError::Io(e) => write!(f, "IO error: {}", e),
            LevelLoadError::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for LevelLoadError {}

/// Error saving a level file
#[derive(Debug)]
pub enum LevelSaveError {
    /// IO error (permission denied, disk full, etc.)
    Io(io::Error),
    /// Serialization error
    Serialize(ron::Error),
}

impl From<io::Error> for LevelSaveError {
    fn from(e: io::Error) -> Self {
        LevelSaveError::Io(e)
    }
}

impl From<ron::Error> for LevelSaveError {
    fn from(e: ron::Error) -> Self {
        LevelSaveError::Serialize(e)
    }
}

impl std::fmt::Display for LevelSaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LevelSaveError::Io(e) => write!(f, "IO error: {}", e),
            LevelSaveError::Serialize(e) => write!(f, "Serialize error: {}", e),
        }
    }
}

impl std::error::Error for LevelSaveError {}

/// Error turning one template into an object
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateError {
    /// No constructor registered for the type name
    UnknownType(String),
    /// A required property is absent
    MissingProperty { type_name: String, property: String },
    /// A property has the wrong kind or an unusable value
    InvalidProperty {
        type_name: String,
        property: String,
        reason: String,
    },
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateError::UnknownType(type_name) => write!(f, "Unknown object type: {}", type_name),
            TemplateError::MissingProperty { type_name, property } => {
                write!(f, "{} is missing property '{}'", type_name, property)
            }
            TemplateError::InvalidProperty {
                type_name,
                property,
                reason,
            } => write!(f, "{} has invalid property '{}': {}", type_name, property, reason),
        }
    }
}

impl std::error::Error for TemplateError {}
