use nom::{
    bytes::complete::take_till1,
    character::complete::{multispace0, multispace1},
    combinator::rest,
    multi::count,
    sequence::{preceded, terminated},
    IResult,
};

/// Parsed `hdfs dfs -ls` output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub directories: Vec<String>,
    pub files: Vec<String>,
}

/// Seven leading columns: permissions, replication, owner, group, size, date, time.
fn entry(input: &str) -> IResult<&str, (Vec<&str>, &str)> {
    let field = terminated(take_till1(char::is_whitespace), multispace1);
    let (input, fields) = preceded(multispace0, count(field, 7))(input)?;
    let (input, path) = rest(input)?;
    Ok((input, (fields, path)))
}

/// Splits listing output into directories and files. Lines that are not
/// entries (`Found 3 items`, blanks) are skipped.
#[must_use]
pub fn parse_listing(output: &str) -> Listing {
    let mut listing = Listing::default();
    for line in output.lines() {
        let Ok((_, (fields, path))) = entry(line) else {
            continue;
        };
        let path = path.trim();
        if path.is_empty() {
            continue;
        }
        if fields[0].starts_with('d') {
            listing.directories.push(path.to_string());
        } else {
            listing.files.push(path.to_string());
        }
    }
    listing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing() {
        let output = "Found 3 items\n\
            drwxr-xr-x   - hive hive          0 2021-05-20 10:00 /user/hive/warehouse/t/part=1\n\
            -rw-r--r--   3 hive hive  268435456 2021-05-20 10:01 /user/hive/warehouse/t/0_data.parq\n\
            -rw-r--r--   3 hive hive       1024 2021-05-20 10:01 /user/hive/my file.parq\n";
        let listing = parse_listing(output);
        assert_eq!(listing.directories, vec!["/user/hive/warehouse/t/part=1"]);
        assert_eq!(
            listing.files,
            vec!["/user/hive/warehouse/t/0_data.parq", "/user/hive/my file.parq"]
        );
    }

    #[test]
    fn test_parse_empty_listing() {
        assert_eq!(parse_listing(""), Listing::default());
        assert_eq!(parse_listing("Found 0 items\n"), Listing::default());
    }
}
