use sea_orm::sea_query::SqliteQueryBuilder;

include!("../tests/resource.rs");

fn main() {
    let text = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    println!("Input: '{text}'");

    match taxa_search::parser::parse(&text) {
        Ok(statement) => println!("\nStatement:\n{statement}"),
        Err(err) => println!("\nStatement:\n{err}"),
    }

    let conn = database();
    let mut search = Search::new(registry(), Options::default());

    for (name, queries) in search.queries(&text) {
        println!("\n{name}:");
        match queries {
            Ok(queries) => {
                for query in queries {
                    println!("{}", query.select.to_string(SqliteQueryBuilder));
                }
            }
            Err(err) => println!("{err}"),
        }
    }

    let records = search
        .search(&text, &mut SqliteSession::new(&conn))
        .expect("Failed to search");

    println!("\nRecords:");
    for record in records {
        println!("{} {}: {:?}", record.table, record.id, record.fields);
    }
}
