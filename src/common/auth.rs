#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Role {
    Administrator,
    Unknown(String),
}
impl axum_keycloak_auth::role::Role for Role {}
impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let config = crate::config::Config::from_env();
        match self {
            Role::Administrator => f.write_str(config.admin_role.as_str()),
            Role::Unknown(unknown) => f.write_fmt(format_args!("Unknown role: {unknown}")),
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        let config = crate::config::Config::from_env();
        let admin_role = config.admin_role.as_str();
        if value == admin_role {
            Role::Administrator
        } else {
            Role::Unknown(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_variants() {
        let admin = Role::Administrator;
        let unknown = Role::Unknown("viewer".to_string());

        assert_eq!(admin, admin.clone());
        assert_ne!(admin, unknown);
        assert_eq!(
            Role::Unknown("viewer".to_string()),
            Role::Unknown("viewer".to_string())
        );
    }

    #[test]
    fn role_pattern_matching() {
        match Role::Unknown("lab-tech".to_string()) {
            Role::Administrator => panic!("Expected Unknown"),
            Role::Unknown(value) => assert_eq!(value, "lab-tech"),
        }
    }
}
