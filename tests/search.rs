include!("resource.rs");

use pretty_assertions::assert_eq;
use sea_orm::sea_query::SqliteQueryBuilder;

fn run_with(text: &str, options: Options) -> Result<Vec<Record>, Error> {
    let conn = database();
    let mut search = Search::new(registry(), options);
    search.search(text, &mut SqliteSession::new(&conn))
}

fn run(text: &str) -> Vec<Record> {
    run_with(text, Options::default()).unwrap()
}

/// The SQL the mapper search creates for `text`.
fn sql(text: &str) -> String {
    let search = Search::new(registry(), Options::default());
    let (name, queries) = search.queries(text).remove(0);
    assert_eq!(name, "MapperSearch");
    queries.unwrap()[0].select.to_string(SqliteQueryBuilder)
}

#[test]
fn test_related_attribute() {
    let records = run("genus where family.epithet = Poaceae");
    assert_eq!(ids(&records, "genus"), vec![1, 2]);
    let poa = records.iter().find(|record| record.id == 1);
    assert_eq!(poa.and_then(|record| record.text("epithet")), Some("Poa"));

    assert_eq!(
        ids(&run("species where genus.family.epithet = Fabaceae"), "species"),
        vec![4, 5]
    );
}

#[test]
fn test_or() {
    // quantities are 2, 0, 1, 3
    let records = run("plant where quantity > 2 or quantity < 1");
    assert_eq!(ids(&records, "plant"), vec![2, 4]);
    assert_eq!(records.len(), 2);

    let records = run("plant where quantity > 0 or code = XA01.1");
    assert_eq!(ids(&records, "plant"), vec![1, 3, 4]);
}

#[test]
fn test_and() {
    assert_eq!(
        ids(&run("plant where quantity > 0 and accession.code = XA01"), "plant"),
        vec![1]
    );
}

#[test]
fn test_not_is_complement() {
    let all = ids(&run("plant where id > 0"), "plant");
    let clause = ids(&run("plant where (quantity > 1 or code like %.2)"), "plant");
    let complement = ids(&run("plant where not (quantity > 1 or code like %.2)"), "plant");

    assert_eq!(clause, vec![1, 2, 4]);
    assert_eq!(complement, vec![3]);

    let mut union = [clause, complement].concat();
    union.sort_unstable();
    assert_eq!(union, all);
}

#[test]
fn test_between_is_inclusive() {
    assert_eq!(
        ids(&run("plant where quantity between 1 and 2"), "plant"),
        vec![1, 3]
    );
}

#[test]
fn test_in() {
    assert_eq!(
        ids(&run("species where genus.epithet in Poa, Zea"), "species"),
        vec![1, 2, 3]
    );
    assert_eq!(
        ids(&run("species where genus.epithet not in (Poa, Zea)"), "species"),
        vec![4, 5, 6]
    );
}

#[test]
fn test_like_ignores_case() {
    assert_eq!(ids(&run("genus where epithet like p%"), "genus"), vec![1]);
    assert_eq!(ids(&run("genus where epithet contains AC"), "genus"), vec![3]);
}

#[test]
fn test_none() {
    assert_eq!(ids(&run("family where author = None"), "family"), vec![3]);
    assert_eq!(ids(&run("family where author != None"), "family"), vec![1, 2]);
}

#[test]
fn test_empty_relationship() {
    let empty = ids(&run("accession where plants = Empty"), "accession");
    let not_empty = ids(&run("accession where plants != Empty"), "accession");

    assert_eq!(empty, vec![4, 5]);
    assert_eq!(not_empty, vec![1, 2, 3]);
}

#[test]
fn test_aggregate() {
    let text = "genus where count(species.id) > 1";

    let sql = sql(text);
    assert!(sql.contains("GROUP BY"), "{sql}");
    assert!(sql.contains("HAVING count("), "{sql}");
    assert!(!sql.contains("WHERE count("), "{sql}");

    let conn = database();
    let mut statement = conn
        .prepare(
            "SELECT genus.id FROM genus JOIN species ON species.genus_id = genus.id \
             GROUP BY genus.id HAVING count(species.id) > 1 ORDER BY genus.id",
        )
        .unwrap();
    let expected = statement
        .query_map([], |row| row.get::<_, i64>(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(expected, vec![1]);
    assert_eq!(ids(&run(text), "genus"), expected);
}

#[test]
fn test_aggregate_distinct() {
    assert_eq!(
        ids(&run("family where count(distinct genera.species.id) >= 2"), "family"),
        vec![1, 2]
    );
    assert_eq!(
        ids(&run("family where count(genera.id) = 1"), "family"),
        vec![3]
    );
}

#[test]
fn test_on_date() {
    // local time, midnight of the next day is not part of the day
    assert_eq!(
        ids(&run("plant where inspected on 2021-01-01"), "plant"),
        vec![1, 3]
    );

    // stored in UTC, the day is evaluated in the reference time zone
    assert_eq!(
        ids(&run("plant where planted on '2021-01-01'"), "plant"),
        vec![1, 2]
    );
    let records = run_with(
        "plant where planted on '2021-01-01'",
        Options {
            reference_offset_minutes: 600,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(ids(&records, "plant"), vec![1]);
}

#[test]
fn test_date_comparison() {
    assert_eq!(
        ids(&run("accession where received > 1/2/2021"), "accession"),
        vec![2, 3, 4]
    );
    let records = run_with(
        "accession where received > 1/2/2021",
        Options {
            date_order: DateOrder::MonthFirst,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(ids(&records, "accession"), vec![1, 2, 3, 4]);
}

#[test]
fn test_join_once() {
    let sql = sql("species where genus.epithet = Poa and genus.author = L.");
    assert_eq!(sql.matches(r#"JOIN "genus""#).count(), 1, "{sql}");

    assert_eq!(
        ids(&run("species where genus.epithet = Poa and genus.author = L."), "species"),
        vec![1, 2]
    );
}

#[test]
fn test_filtered_identifier() {
    assert_eq!(
        ids(&run("family where genera[author=Mill.].epithet = Inga"), "family"),
        vec![2]
    );
    assert!(run("family where genera[author=L.].epithet = Inga").is_empty());
}

#[test]
fn test_proxy() {
    assert_eq!(ids(&run("species where genus_name = Poa"), "species"), vec![1, 2]);
}

#[test]
fn test_subquery() {
    assert_eq!(
        ids(&run("accession where received = (max(accession.received))"), "accession"),
        vec![3, 4]
    );
    assert_eq!(
        ids(
            &run("species where accessions.code in (accession.code where source = wild)"),
            "species"
        ),
        vec![1, 3]
    );
}

#[test]
fn test_correlated_subquery() {
    // accessions with a plant larger than the smallest one of the accession
    assert_eq!(
        ids(
            &run("accession where plants.quantity > (min(plant.quantity) correlate)"),
            "accession"
        ),
        vec![1]
    );
}

#[test]
fn test_aggregate_of_aggregate() {
    assert_eq!(
        ids(
            &run("genus where count(species.id) = (max(count(genus.species.id)))"),
            "genus"
        ),
        vec![1]
    );
}

#[test]
fn test_numbers() {
    assert_eq!(ids(&run("plant where quantity = 3.0"), "plant"), vec![4]);
    assert_eq!(ids(&run("plant where quantity >= '2'"), "plant"), vec![1, 4]);
}

#[test]
fn test_exclude_inactive() {
    let options = Options {
        exclude_inactive: true,
        ..Default::default()
    };

    assert_eq!(
        ids(&run_with("plant where quantity >= 0", options.clone()).unwrap(), "plant"),
        vec![1, 3, 4]
    );
    // no active flag on genus
    assert_eq!(
        ids(&run_with("genus where id > 0", options).unwrap(), "genus"),
        vec![1, 2, 3, 4, 5]
    );
}

#[test]
fn test_errors() {
    assert!(matches!(
        run_with("plant where nothing = 1", Options::default()),
        Err(Error::UnknownIdentifier { table, segment }) if table == "plant" && segment == "nothing"
    ));
    assert!(matches!(
        run_with("plant where quantity >", Options::default()),
        Err(Error::Syntax { .. })
    ));
    assert!(matches!(
        run_with("plant where accession = 1", Options::default()),
        Err(Error::NotAnAttribute(name)) if name == "accession"
    ));
    assert!(matches!(
        run_with(
            "accession where received = (max(accession.received) correlate)",
            Options::default()
        ),
        Err(Error::Configuration(_))
    ));
}
