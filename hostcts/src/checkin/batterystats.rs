use crate::checkin::schema::{Arity, Field, Rest, Schema, SchemaEntry, VersionRange};
use crate::checkin::CheckinRecord;

use Field::{Double, Int, Literal, Text};

/// Every batterystats line starts with `<old version>,<uid>,<aggregation>`
pub const PREFIX_LEN: usize = 3;

const AGGREGATION_TYPES: &[&str] = &["i", "l", "c", "u"];

macro_rules! exactly {
    ($tags:expr, $n:expr, [$($f:expr),* $(,)?]) => {
        SchemaEntry {
            tags: $tags,
            versions: VersionRange::ANY,
            schema: Schema {
                arity: Arity::Exactly($n),
                fields: &[$($f),*],
                rest: Rest::Unchecked,
            },
        }
    };
}

macro_rules! at_least {
    ($tags:expr, $n:expr, [$($f:expr),* $(,)?], $rest:expr) => {
        SchemaEntry {
            tags: $tags,
            versions: VersionRange::ANY,
            schema: Schema {
                arity: Arity::AtLeast($n),
                fields: &[$($f),*],
                rest: $rest,
            },
        }
    };
}

/// `dumpsys batterystats --checkin` record layouts. Counts include the
/// three prefix fields and the tag.
pub static SCHEMAS: &[SchemaEntry] = &[
    // checkin version, parcel version, start and end platform versions
    exactly!(&["vers"], 8, [Int, Int, Text, Text]),
    exactly!(&["uid"], 6, [Int, Text]),
    // wakeups, apk, service, start time, starts, launches
    exactly!(&["apk"], 10, [Int, Text, Text, Int, Int, Int]),
    // process, user, system, foreground, starts
    at_least!(&["pr"], 9, [Text, Int, Int, Int, Int], Rest::Unchecked),
    exactly!(&["sr"], 7, [Int, Int, Int]),
    exactly!(&["vib"], 6, [Int, Int]),
    exactly!(&["fg"], 6, [Int, Int]),
    exactly!(&["st"], 7, [Int, Int, Int]),
    exactly!(
        &["wl"],
        14,
        [
            Text,
            Int,
            Literal("f"),
            Int,
            Int,
            Literal("p"),
            Int,
            Int,
            Literal("w"),
            Int,
        ]
    ),
    exactly!(&["sy"], 7, [Text, Int, Int]),
    exactly!(&["jb"], 7, [Text, Int, Int]),
    exactly!(&["kwl"], 7, [Text, Int, Int]),
    // wakeup reason parts, then total time and count
    at_least!(&["wr"], 7, [], Rest::TrailingInts(2)),
    exactly!(&["nt"], 14, [Int, Int, Int, Int, Int, Int, Int, Int, Int, Int]),
    exactly!(&["ua"], 7, [Int, Int, Int]),
    exactly!(
        &["bt"],
        12,
        [Field::IntOr("N/A"), Int, Int, Int, Int, Int, Int, Int]
    ),
    exactly!(&["dc"], 8, [Int, Int, Int, Int]),
    exactly!(&["lv"], 6, [Int, Int]),
    exactly!(&["wfl"], 7, [Int, Int, Int]),
    // index 15 is the legacy input event count, always 0
    at_least!(
        &["m"],
        20,
        [
            Int,
            Int,
            Int,
            Int,
            Int,
            Int,
            Int,
            Int,
            Int,
            Int,
            Int,
            Literal("0"),
            Int,
            Int,
            Int,
            Int,
        ],
        Rest::Unchecked
    ),
    exactly!(&["gn"], 12, [Int, Int, Int, Int, Int, Int, Int, Int]),
    exactly!(&["br"], 9, [Int, Int, Int, Int, Int]),
    exactly!(&["sgt", "sgc"], 9, [Int, Int, Int, Int, Int]),
    exactly!(&["sst"], 5, [Int]),
    exactly!(
        &["dct", "dcc"],
        21,
        [Int, Int, Int, Int, Int, Int, Int, Int, Int, Int, Int, Int, Int, Int, Int, Int, Int]
    ),
    exactly!(&["wst", "wsc"], 12, [Int, Int, Int, Int, Int, Int, Int, Int]),
    exactly!(
        &["wsst", "wssc"],
        17,
        [Int, Int, Int, Int, Int, Int, Int, Int, Int, Int, Int, Int, Int]
    ),
    exactly!(&["wsgt", "wsgc"], 9, [Int, Int, Int, Int, Int]),
    exactly!(&["bst", "bsc"], 8, [Int, Int, Int, Int]),
    // capacity, computed, min drained, max drained
    exactly!(&["pws"], 8, [Double, Double, Double, Double]),
    exactly!(&["pwi"], 6, [Text, Double]),
    // duration, level, screen, power save
    exactly!(&["dsd", "csd"], 8, [Int, Field::IntOr("?"), Text, Text]),
    exactly!(&["dtr"], 5, [Int]),
    exactly!(&["ctr"], 5, [Int]),
];

pub const REQUIRED_TAGS: &[&str] = &["vers", "bt", "dc", "m"];

/// Check the `<old version>,<uid>,<aggregation>` prefix
pub fn check_prefix(record: &CheckinRecord) -> crate::Result<()> {
    record.int(0)?;
    record.int(1)?;
    let aggregation = record.field(2)?;
    if !AGGREGATION_TYPES.iter().any(|it| *it == aggregation) {
        return Err(record.error(format!("malformed stat: {}", aggregation)));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::checkin::schema::resolve;
    use crate::checkin::{verify, Format};
    use rstest::*;

    fn record(line: &str) -> CheckinRecord {
        CheckinRecord::new(1, Some(14), PREFIX_LEN, Format::Batterystats.split_line(line))
    }

    fn check(line: &str) -> crate::Result<()> {
        let record = record(line);
        check_prefix(&record)?;
        match resolve(SCHEMAS, record.tag(), record.version()) {
            Some(schema) => schema.check(&record),
            None => Ok(()),
        }
    }

    #[rstest]
    #[case("9,0,i,vers,14,123,LMY47D,LMY47D", true)]
    #[case("9,0,i,vers,14,123,LMY47D", false)]
    #[case("9,0,x,vers,14,123,LMY47D,LMY47D", false)]
    #[case("9,zero,i,uid,10001,com.a", false)]
    #[case("9,1000,l,pr,system,100,200,0,1", true)]
    #[case("9,1000,l,pr,system,100,200,0,1,extra,fields", true)]
    #[case("9,1000,l,pr,system,100,200,0", false)]
    #[case("9,1000,l,wl,lock,0,f,0,10,p,2,0,w,0", true)]
    #[case("9,1000,l,wl,lock,0,x,0,10,p,2,0,w,0", false)]
    #[case("9,0,i,wr,Abort:Pending Wakeup Sources,10,2", true)]
    #[case("9,0,i,wr,Abort,part two,part three,10,2", true)]
    #[case("9,0,i,wr,Abort,10,two", false)]
    #[case("9,0,l,bt,N/A,1,2,3,4,5,6,7", true)]
    #[case("9,0,l,bt,0,1,2,3,4,5,6,7", true)]
    #[case("9,0,l,bt,?,1,2,3,4,5,6,7", false)]
    #[case("9,0,l,dc,1,2,3,4", true)]
    #[case("9,0,l,m,1,2,3,4,5,6,7,8,9,10,11,0,12,13,14,15", true)]
    #[case("9,0,l,m,1,2,3,4,5,6,7,8,9,10,11,1,12,13,14,15", false)]
    #[case("9,0,l,m,1,2,3,4,5,6,7,8,9,10,11,0,12,13,14", false)]
    #[case("9,0,i,pws,3000.0,120.5,100,140.25", true)]
    #[case("9,0,i,pws,3000.0,lots,100,140.25", false)]
    #[case("9,0,i,pwi,scrn,45.2", true)]
    #[case("9,0,i,dsd,1000,?,s+,p-", true)]
    #[case("9,0,i,csd,1000,95,s+,p-", true)]
    #[case("9,0,i,csd,1000,N/A,s+,p-", false)]
    #[case("9,0,l,sgt,1,2,3,4,5", true)]
    #[case("9,0,l,sgc,1,2,3,4", false)]
    #[case("9,0,l,dct,0,1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16", true)]
    #[case("9,0,l,wsst,0,1,2,3,4,5,6,7,8,9,10,11,12", true)]
    #[case("9,0,l,zzz,whatever", true)]
    fn test_schemas(#[case] line: &str, #[case] ok: bool) {
        assert_eq!(check(line).is_ok(), ok, "{}", line);
    }

    #[rstest]
    fn test_trailing_empty_fields_dropped() {
        // the trailing empty fields vanish, leaving vers one field short
        assert!(check("9,0,i,vers,14,123,LMY47D,,").is_err());
        // empty columns at the end of a line are not counted
        assert!(check("9,0,l,sgt,1,2,3,4,5,,,").is_ok());
    }

    #[rstest]
    fn test_full_dump() {
        let dump = "\
9,0,i,vers,14,123,LMY47D,LMY47D
9,0,i,uid,10001,com.android.example
9,0,l,bt,N/A,1000,1000,2000,2000,1430827200000,500,500
9,0,l,dc,1,2,3,4
9,0,l,m,1,2,3,4,5,6,7,8,9,10,11,0,12,13,14,15
9,10001,l,wl,*alarm*,0,f,0,10,p,2,0,w,0
9,0,i,dsd,1000,?,s+,p-
";
        let report = verify(Format::Batterystats, dump).expect("valid dump");
        assert_eq!(report.version, Some(14));
        assert_eq!(report.records, 7);

        let broken = dump.replace("9,0,l,dc,1,2,3,4\n", "");
        let err = verify(Format::Batterystats, &broken).unwrap_err();
        assert!(err.to_string().contains("dc"));
    }
}
