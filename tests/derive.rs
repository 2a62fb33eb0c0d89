include!("resource.rs");

use pretty_assertions::assert_eq;
use taxa_search::schema::{Proxy, Relationship};

#[test]
fn test_attributes() {
    let table = Plant::table();

    assert_eq!(table.name, "plant");
    assert_eq!(table.primary_key, "id");
    assert_eq!(
        table
            .attributes
            .iter()
            .map(|attribute| (attribute.name.as_str(), attribute.kind.clone()))
            .collect::<Vec<_>>(),
        vec![
            ("code", AttributeType::Text),
            ("quantity", AttributeType::Integer),
            ("planted", AttributeType::Timestamp),
            ("inspected", AttributeType::DateTime),
            ("active", AttributeType::Boolean),
        ]
    );
    assert_eq!(Plant::names(), &["plant", "planting"]);
    assert_eq!(Plant::default_attributes(), &["code"]);
}

#[test]
fn test_choices() {
    let table = Accession::table();
    assert_eq!(
        table.find_attribute("source").map(|attribute| attribute.kind.clone()),
        Some(AttributeType::Enumerated(vec![
            "garden".to_string(),
            "wild".to_string()
        ]))
    );
    assert_eq!(
        table.find_attribute("received").map(|attribute| attribute.kind.clone()),
        Some(AttributeType::Date)
    );
}

#[test]
fn test_relationships() {
    let table = Genus::table();

    assert_eq!(
        table.relationships,
        vec![
            Relationship {
                name: "family".into(),
                target: "family".into(),
                local_column: "family_id".into(),
                remote_column: "id".into(),
            },
            Relationship {
                name: "species".into(),
                target: "species".into(),
                local_column: "id".into(),
                remote_column: "genus_id".into(),
            },
        ]
    );
    assert_eq!(Genus::default_attributes(), &["epithet", "author"]);
}

#[test]
fn test_proxy() {
    assert_eq!(
        Species::table().proxies,
        vec![Proxy {
            name: "genus_name".into(),
            relationship: "genus".into(),
            attribute: "epithet".into(),
        }]
    );
}

#[test]
fn test_register() {
    let registry = registry();
    let domains = registry.domains();

    assert_eq!(domains.len(), 5);
    assert_eq!(
        domains.names().collect::<Vec<_>>(),
        vec![
            "family", "fam", "genus", "gen", "species", "sp", "accession", "acc", "plant",
            "planting"
        ]
    );
    assert_eq!(
        domains.resolve("planting").map(|domain| domain.table.as_str()),
        Some("plant")
    );
    assert!(registry.schema().table("accession").is_some());

    let mut registry = registry.clone();
    assert!(registry.register::<Plant>().is_err());
}
