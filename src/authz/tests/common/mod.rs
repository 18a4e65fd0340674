//! Shared fixtures for the integration suites

#![allow(dead_code)]

use arbiter_authz::Authority;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Towny-style permission nodes used across the suites
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Towny {
    All,
    Chat,
    ChatTown,
    ChatNation,
    ChatGlobal,
    Wild,
    WildBuild,
    WildBuildX,
    WildDestroy,
    WildDestroyX,
}

impl Towny {
    pub const ALL: [Towny; 10] = [
        Towny::All,
        Towny::Chat,
        Towny::ChatTown,
        Towny::ChatNation,
        Towny::ChatGlobal,
        Towny::Wild,
        Towny::WildBuild,
        Towny::WildBuildX,
        Towny::WildDestroy,
        Towny::WildDestroyX,
    ];
}

impl AsRef<str> for Towny {
    fn as_ref(&self) -> &str {
        match self {
            Towny::All => "towny.*",
            Towny::Chat => "towny.chat.*",
            Towny::ChatTown => "towny.chat.town",
            Towny::ChatNation => "towny.chat.nation",
            Towny::ChatGlobal => "towny.chat.global",
            Towny::Wild => "towny.wild.*",
            Towny::WildBuild => "towny.wild.build.*",
            Towny::WildBuildX => "towny.wild.build.<x>",
            Towny::WildDestroy => "towny.wild.destroy.*",
            Towny::WildDestroyX => "towny.wild.destroy.<x>",
        }
    }
}

pub const EGG: &str = "egg";
pub const SPAM: &str = "spam";
pub const HAM: &str = "ham";
pub const ORANGE: &str = "orange";
pub const APPLE: &str = "apple";
pub const PEAR: &str = "pear";
pub const BANANA: &str = "banana";

pub const FOOD: &str = "food";
pub const ANIMAL_BASED: &str = "animal_based";
pub const PLANT_BASED: &str = "plant_based";

/// Installs a log subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Authority with every Towny node and no entities
pub fn towny_authority() -> Authority {
    init_tracing();
    let mut auth = Authority::new();
    auth.register_permission_nodes(Towny::ALL).unwrap();
    auth
}

/// The food hierarchy:
///
/// ```text
///              food (towny.chat.global)
///             /                        \
/// animal_based                          plant_based
///  chat.town, build <dirt> <gold>        chat.nation, destroy <dirt> <gold>
///  egg spam ham (ham: towny.wild.*)      orange apple pear banana
/// ```
pub fn food_authority() -> Authority {
    let mut auth = towny_authority();

    for rid in [FOOD, ANIMAL_BASED, PLANT_BASED] {
        auth.add_role(rid).unwrap();
    }
    for sid in [EGG, SPAM, HAM, ORANGE, APPLE, PEAR, BANANA] {
        auth.add_subject(sid).unwrap();
    }

    auth.role_add_inheritance(FOOD, ANIMAL_BASED).unwrap();
    auth.role_add_inheritance(FOOD, PLANT_BASED).unwrap();

    for sid in [EGG, SPAM, HAM] {
        auth.role_assign_subject(ANIMAL_BASED, sid).unwrap();
    }
    for sid in [ORANGE, APPLE, PEAR, BANANA] {
        auth.role_assign_subject(PLANT_BASED, sid).unwrap();
    }

    auth.role_grant_permission(FOOD, Towny::ChatGlobal.as_ref(), None).unwrap();

    auth.role_grant_permission(ANIMAL_BASED, Towny::ChatTown.as_ref(), None).unwrap();
    for payload in ["dirt", "gold"] {
        auth.role_grant_permission(ANIMAL_BASED, Towny::WildBuildX.as_ref(), Some(payload))
            .unwrap();
    }

    auth.role_grant_permission(PLANT_BASED, Towny::ChatNation.as_ref(), None).unwrap();
    for payload in ["dirt", "gold"] {
        auth.role_grant_permission(PLANT_BASED, Towny::WildDestroyX.as_ref(), Some(payload))
            .unwrap();
    }

    auth.subject_grant_permission(HAM, Towny::Wild.as_ref(), None).unwrap();
    auth
}

/// Checks every fact the food hierarchy implies
pub fn assert_food_authority(auth: &Authority) {
    use arbiter_authz::EntityId;
    use std::collections::BTreeSet;

    let ids = |items: &[&str]| -> BTreeSet<EntityId> { items.iter().map(|s| EntityId::from(*s)).collect() };

    assert_eq!(auth.get_roles(), ids(&[FOOD, ANIMAL_BASED, PLANT_BASED]));
    assert_eq!(auth.get_subjects(), ids(&[EGG, SPAM, HAM, ORANGE, APPLE, PEAR, BANANA]));

    assert_eq!(auth.role_get_children(FOOD).unwrap(), ids(&[ANIMAL_BASED, PLANT_BASED]));
    assert_eq!(auth.role_get_parents(ANIMAL_BASED).unwrap(), ids(&[FOOD]));
    assert_eq!(auth.role_get_parents(PLANT_BASED).unwrap(), ids(&[FOOD]));
    assert_eq!(auth.role_get_subjects(ANIMAL_BASED).unwrap(), ids(&[EGG, SPAM, HAM]));
    assert_eq!(auth.role_get_subjects(PLANT_BASED).unwrap(), ids(&[ORANGE, APPLE, PEAR, BANANA]));
    assert_eq!(auth.subject_get_roles(EGG).unwrap(), ids(&[ANIMAL_BASED]));
    assert_eq!(auth.subject_get_roles(ORANGE).unwrap(), ids(&[PLANT_BASED]));

    let has = |sid: &str, node: Towny, payload: Option<&str>| {
        auth.subject_has_permission(sid, node.as_ref(), payload).unwrap()
    };

    assert!(has(EGG, Towny::ChatGlobal, None));
    assert!(has(PEAR, Towny::ChatGlobal, None));

    assert!(has(EGG, Towny::ChatTown, None));
    assert!(!has(EGG, Towny::ChatNation, None));
    assert!(!has(PEAR, Towny::ChatTown, None));
    assert!(has(PEAR, Towny::ChatNation, None));

    assert!(has(EGG, Towny::WildBuildX, Some("dirt")));
    assert!(has(EGG, Towny::WildBuildX, Some("gold")));
    assert!(!has(EGG, Towny::WildDestroyX, Some("dirt")));
    assert!(!has(EGG, Towny::WildDestroyX, Some("gold")));

    assert!(!has(PEAR, Towny::WildBuildX, Some("dirt")));
    assert!(!has(PEAR, Towny::WildBuildX, Some("gold")));
    assert!(has(PEAR, Towny::WildDestroyX, Some("dirt")));
    assert!(has(PEAR, Towny::WildDestroyX, Some("gold")));

    assert!(has(HAM, Towny::WildBuildX, Some("dirt")));
    assert!(has(HAM, Towny::WildBuildX, Some("iron")));
    assert!(has(HAM, Towny::WildDestroyX, Some("gold")));
}
