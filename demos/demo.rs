use tagtable::*;

fn main() -> Result<(), TableError> {
    println!("In-Memory Table Demo\n");

    // Create DB
    let mut db = Database::new();

    // Declare a key and a tag before any data
    db.execute(
        "stocks",
        Request::Key(KeyRequest {
            column: "ticker".into(),
        }),
    )?;
    db.execute(
        "stocks",
        Request::Tag(TagRequest {
            column: "sector".into(),
        }),
    )?;
    println!("Created table 'stocks' with key 'ticker' and tag 'sector'");

    // Insert data
    println!("Inserting data...");
    for (ticker, sector, bid) in [
        ("IBM", "tech", "140"),
        ("XOM", "energy", "110"),
        ("MSFT", "tech", "410"),
    ] {
        db.execute(
            "stocks",
            Request::Insert(InsertRequest::new([
                ("ticker", ticker),
                ("sector", sector),
                ("bid", bid),
            ])),
        )?;
    }
    println!("Inserted 3 rows\n");

    // Duplicate keys are rejected
    let dup = db.execute(
        "stocks",
        Request::Insert(InsertRequest::new([("ticker", "IBM")])),
    );
    println!("Inserting IBM again: {}\n", dup.unwrap_err());

    // Read by tag
    println!("Tech stocks:");
    if let Response::Select(res) = db.execute(
        "stocks",
        Request::Select(SelectRequest::filtered("sector", "tech")),
    )? {
        println!("{}", res.columns.join("\t"));
        println!("{}", "-".repeat(30));
        for row in res.records {
            println!("{}", row.join("\t"));
        }
    }
    println!();

    // Delete by key
    db.execute(
        "stocks",
        Request::Delete(DeleteRequest {
            filter: Some(Filter::new("ticker", "IBM")),
        }),
    )?;

    let table = db.get_table("stocks").expect("table was created above");
    println!(
        "After deleting IBM: {} live rows, {} tech rows, {} bytes allocated",
        table.live_record_count(),
        table.tag_chain_len("sector", "tech"),
        table.allocated_bytes()
    );

    // List tables
    println!("Tables in database:");
    for table_name in db.list_tables() {
        println!("  - {}", table_name);
    }

    Ok(())
}
