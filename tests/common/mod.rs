#![allow(dead_code)]

use riding_forecast::database::ingestion::{CsvIngester, TableKind};
use riding_forecast::database::ForecastDatabase;
use std::fs;
use std::path::{Path, PathBuf};

pub const RIDINGS_CSV: &str = "\
id,province,riding
1,Ontario,Alpha
2,Quebec,Beta
3,Ontario,Gamma
";

// Riding 3 has no results; riding 1 lists two independents and one untracked party.
pub const RESULTS_CSV: &str = "\
riding_id,year,party,candidate,vote_count,vote_percentage,elected,incumbent,lean_vs_province,lean_vs_federal
1,2019,lpc,Ann,5500,55.0,True,True,1.5,2.0
1,2019,cpc,Bob,4000,40.0,False,False,,
1,2019,other,Cat,200,2.0,False,False,,
1,2019,other,Dan,300,3.0,False,False,,
1,2019,ppc,Eve,50,0.5,False,False,,
2,2019,bq,Fay,4500,45.0,True,False,,
2,2019,lpc,Gus,3500,35.0,False,True,,
2,2019,ndp,Hal,2000,20.0,False,False,,
";

pub const NATIONAL_CSV: &str = "\
party,vote_percentage
LPC,33.1
CPC,34.3
NDP,16.0
GPC,6.5
BQ,7.6
Other,2.5
PPC,1.6
";

pub const POLLS_CSV: &str = "\
region,last_date,firm,method,sample_size,error,lpc,cpc,ndp,gpc,bq,other
National,2021-04-16,Firm A,Online,1200,2.8,35,30,18,5,7,5
National,2021-04-10,Firm B,IVR,900,3.3,33,31,19,6,7,4
national,2021-03-01,Firm C,Phone,1000,3.1,30,35,20,5,7,3
Ontario,2021-04-15,Firm D,Online,800,3.5,40,35,18,5,,2
";

pub fn write_csv(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// Import every fixture table into `db`.
pub async fn ingest_fixtures(db: &ForecastDatabase, dir: &Path) {
    let ingester = CsvIngester::new(db.clone());
    for (kind, name, contents) in [
        (TableKind::Ridings, "ridings.csv", RIDINGS_CSV),
        (TableKind::Results, "results.csv", RESULTS_CSV),
        (TableKind::National, "national.csv", NATIONAL_CSV),
        (TableKind::Polls, "polls.csv", POLLS_CSV),
    ] {
        let path = write_csv(dir, name, contents);
        ingester.ingest_file(&path, kind, false).await.unwrap();
    }
}

pub async fn fixture_database(dir: &Path) -> ForecastDatabase {
    let db = ForecastDatabase::create_in_memory().await.unwrap();
    db.init().await.unwrap();
    ingest_fixtures(&db, dir).await;
    db
}
