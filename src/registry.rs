use tracing::info;

use crate::{
    error::TLineError,
    families::{self, CrossSectionBuilder},
    parameters::{LengthUnit, ParameterSpec, ParameterTree},
};

/// A registered transmission-line family
pub struct FamilyDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
    /// Labels used by presentation layers for filtering
    pub category_tags: Vec<String>,
    pub builder: Box<dyn CrossSectionBuilder>,
}

impl FamilyDescriptor {
    /// A parameter tree filled with every default of this family
    pub fn default_parameters(&self, length_unit: LengthUnit) -> ParameterTree {
        ParameterTree::from_defaults(&self.parameters, length_unit)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.category_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

impl std::fmt::Debug for FamilyDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FamilyDescriptor")
            .field("name", &self.name)
            .field("parameters", &self.parameters.len())
            .field("category_tags", &self.category_tags)
            .finish()
    }
}

/// Ordered collection of families with unique names
///
/// Filled once at start-up and only read afterwards, so a shared reference can
/// be handed to any number of concurrent requests.
#[derive(Debug, Default)]
pub struct FamilyRegistry {
    families: Vec<FamilyDescriptor>,
}

impl FamilyRegistry {
    pub fn new() -> FamilyRegistry {
        FamilyRegistry::default()
    }

    /// Creates a registry holding every family this crate ships
    pub fn with_builtin_families() -> Result<FamilyRegistry, TLineError> {
        let mut registry = FamilyRegistry::new();
        families::microstrip::register(&mut registry)?;
        info!("registered {} transmission line families", registry.len());
        Ok(registry)
    }

    /// Appends a family
    ///
    /// # Returns
    /// A registry error if a family with the same name already exists. This
    /// is a configuration mistake and callers should treat it as fatal.
    pub fn register(&mut self, descriptor: FamilyDescriptor) -> Result<(), TLineError> {
        if self.by_name(&descriptor.name).is_some() {
            return Err(TLineError::Registry(format!(
                "Family '{}' is registered twice",
                descriptor.name
            )));
        }
        self.families.push(descriptor);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FamilyDescriptor> {
        self.families.get(index)
    }

    pub fn by_name(&self, name: &str) -> Option<&FamilyDescriptor> {
        self.families.iter().find(|f| f.name == name)
    }

    /// Like [`FamilyRegistry::by_name`], but an unknown name is an error
    pub fn find(&self, name: &str) -> Result<&FamilyDescriptor, TLineError> {
        self.by_name(name).ok_or_else(|| {
            let known: Vec<&str> = self.families.iter().map(|f| f.name.as_str()).collect();
            TLineError::Registry(format!(
                "Unknown family '{name}'. Known families: {}",
                known.join(", ")
            ))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &FamilyDescriptor> {
        self.families.iter()
    }

    pub fn with_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a FamilyDescriptor> {
        self.families.iter().filter(move |f| f.has_tag(tag))
    }
}
