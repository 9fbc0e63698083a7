use diesel::prelude::{Queryable, Selectable};

use super::Sub;

#[derive(Queryable, Selectable, Clone, Debug, PartialEq)]
#[diesel(table_name = crate::schema::profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Profile {
    id: Sub,
    first_name: Option<String>,
    last_name: Option<String>,
}

impl Profile {
    pub fn new(id: Sub, first_name: Option<&str>, last_name: Option<&str>) -> Self {
        Self {
            id,
            first_name: first_name.map(String::from),
            last_name: last_name.map(String::from),
        }
    }

    pub const fn id(&self) -> &Sub {
        &self.id
    }

    /// First and last name joined by a space. A profile without any name
    /// part has no display name.
    pub fn display_name(&self) -> Option<String> {
        let first = self.first_name.as_deref().unwrap_or_default();
        let last = self.last_name.as_deref().unwrap_or_default();
        let name = format!("{first} {last}").trim().to_string();

        if name.is_empty() { None } else { Some(name) }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_join_first_and_last_name() {
        let p = Profile::new(Sub("u1".into()), Some("Jora"), Some("Cardan"));
        assert_eq!(p.display_name().as_deref(), Some("Jora Cardan"));
    }

    #[test]
    fn should_trim_missing_last_name() {
        let p = Profile::new(Sub("u1".into()), Some("Jora"), None);
        assert_eq!(p.display_name().as_deref(), Some("Jora"));
    }

    #[test]
    fn should_have_no_display_name_without_name_parts() {
        let p = Profile::new(Sub("u1".into()), None, Some("  "));
        assert_eq!(p.display_name(), None);
    }
}
