//! Benchmark Plan
//!
//! Parses the block-structured configuration into an immutable plan.
//!
//! ```text
//! (dims
//! 10 10
//! 1000 1000
//! )
//! (n_total
//! 1000000
//! )
//! (n_tests_min
//! 5
//! )
//! (functions
//! # test_name  function  roles  types
//! add         idx_add   iio    8u32f
//! )
//! (convolution
//! # repeat size n_examples size_param
//! 10 32 100 5
//! 32f
//! )
//! ```
//!
//! Lines starting with `#` are comments, anywhere in the file. Blocks open with `(`
//! and close with `)`; inside a block, blank lines are skipped, the first remaining
//! line names the block and the others are whitespace-separated rows. The
//! `convolution` block is optional.
//!
//! Seeds are assigned 0, 1, 2, ... to functions in declaration order, so parsing the
//! same file always reproduces the same generated data.

use crate::invocation::parse_roles;
use crate::program::is_reserved;
use crate::{COEFFICIENT_COUNT, ConfigurationError, ElementType, ParamRole, Shape, decode_type_codes};
use std::collections::BTreeMap;
use std::path::Path;

/// Repeat count paired with a shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// Number of calls inside the timed region
    pub repeat_count: u64,
    /// Shape of every container
    pub shape: Shape,
}

/// `repeat_count = max(n_tests_min, n_total / size)`
pub fn derive_pattern(n_total: u64, n_tests_min: u64, shape: Shape) -> Pattern {
    let repeat_count = n_tests_min.max(n_total / shape.size());
    Pattern {
        repeat_count,
        shape,
    }
}

/// One function to benchmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkCase {
    /// Unique test name
    pub test_name: String,
    /// Function called in the timed region
    pub function_name: String,
    /// One role per parameter
    pub roles: Vec<ParamRole>,
    /// Element types to instantiate, in declaration order
    pub element_types: Vec<ElementType>,
    /// Seed for this case's generated data
    pub seed: u64,
}

/// One convolution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvolutionPattern {
    /// Repetitions inside the timed region
    pub repeat_count: u64,
    /// Input size
    pub size: u64,
    /// Number of examples
    pub n_examples: u64,
    /// Kernel size parameter
    pub size_param: u64,
}

/// Optional convolution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvolutionPlan {
    /// Runs, in declaration order
    pub patterns: Vec<ConvolutionPattern>,
    /// Element types to run each pattern for
    pub element_types: Vec<ElementType>,
}

/// Parsed configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkPlan {
    /// Shapes, in declaration order
    pub dims: Vec<Shape>,
    /// Work budget shared out across repeats
    pub n_total: u64,
    /// Minimum repeat count
    pub n_tests_min: u64,
    /// One pattern per shape
    pub patterns: Vec<Pattern>,
    /// Functions, with sequential seeds
    pub functions: Vec<BenchmarkCase>,
    /// Convolution pass, if configured
    pub convolution: Option<ConvolutionPlan>,
}

type Rows = Vec<Vec<String>>;

impl BenchmarkPlan {
    /// Read and parse a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigurationError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&text)
    }

    /// Parse configuration text
    pub fn parse(text: &str) -> Result<Self, ConfigurationError> {
        let blocks = split_blocks(text)?;

        let dims_rows = required(&blocks, "dims")?;
        if dims_rows.is_empty() {
            return Err(ConfigurationError::EmptyBlockBody { block: "dims" });
        }
        let dims = dims_rows
            .iter()
            .map(|row| {
                let dims = row
                    .iter()
                    .map(|t| parse_int("dims", t))
                    .collect::<Result<Vec<_>, _>>()?;
                if dims.len() > COEFFICIENT_COUNT {
                    return Err(ConfigurationError::TooManyDimensions {
                        rank: dims.len(),
                        max: COEFFICIENT_COUNT,
                    });
                }
                Shape::new(dims)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let n_total = single_int(&blocks, "n_total")?;
        let n_tests_min = single_int(&blocks, "n_tests_min")?;
        if n_tests_min == 0 {
            return Err(ConfigurationError::ZeroRepeatFloor);
        }

        let patterns = dims
            .iter()
            .map(|shape| derive_pattern(n_total, n_tests_min, shape.clone()))
            .collect();

        let functions = parse_functions(required(&blocks, "functions")?)?;

        let convolution = blocks
            .get("convolution")
            .map(parse_convolution)
            .transpose()?;

        Ok(Self {
            dims,
            n_total,
            n_tests_min,
            patterns,
            functions,
            convolution,
        })
    }
}

fn split_blocks(text: &str) -> Result<BTreeMap<String, Rows>, ConfigurationError> {
    let text = text
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");
    let mut pieces: Vec<&str> = text.split(')').collect();
    // Whatever follows the last ')' is not a block
    pieces.pop();

    let mut blocks = BTreeMap::new();
    for piece in pieces {
        let piece = piece.trim();
        let Some(body) = piece.strip_prefix('(') else {
            let first = piece.lines().next().unwrap_or_default();
            return Err(ConfigurationError::MissingOpenParen(first.to_string()));
        };

        let mut lines = body
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty());
        let name = lines.next().ok_or(ConfigurationError::EmptyBlock)?;
        let rows = lines
            .map(|line| line.split_whitespace().map(str::to_string).collect())
            .collect();
        blocks.insert(name.to_string(), rows);
    }
    Ok(blocks)
}

fn required<'a>(
    blocks: &'a BTreeMap<String, Rows>,
    name: &'static str,
) -> Result<&'a Rows, ConfigurationError> {
    blocks.get(name).ok_or(ConfigurationError::MissingBlock(name))
}

fn parse_int(block: &'static str, token: &str) -> Result<u64, ConfigurationError> {
    token
        .parse()
        .map_err(|_| ConfigurationError::InvalidInteger {
            block,
            token: token.to_string(),
        })
}

fn single_int(
    blocks: &BTreeMap<String, Rows>,
    name: &'static str,
) -> Result<u64, ConfigurationError> {
    let token = required(blocks, name)?
        .first()
        .and_then(|row| row.first())
        .ok_or(ConfigurationError::EmptyBlockBody { block: name })?;
    parse_int(name, token)
}

fn parse_functions(rows: &Rows) -> Result<Vec<BenchmarkCase>, ConfigurationError> {
    let mut functions: Vec<BenchmarkCase> = Vec::with_capacity(rows.len());
    for (seed, row) in rows.iter().enumerate() {
        let [test_name, function_name, roles, types] = row.as_slice() else {
            return Err(ConfigurationError::MalformedFunction(row.join(" ")));
        };

        if functions.iter().any(|f| &f.test_name == test_name) {
            return Err(ConfigurationError::DuplicateTestName(test_name.clone()));
        }
        validate_function_name(function_name)?;
        let roles = parse_roles(roles)?;
        if roles.iter().all(|role| role.container_flags().is_none()) {
            return Err(ConfigurationError::NoContainers);
        }

        functions.push(BenchmarkCase {
            test_name: test_name.clone(),
            function_name: function_name.clone(),
            roles,
            element_types: decode_type_codes(types)?,
            seed: seed as u64,
        });
    }
    Ok(functions)
}

/// C identifier, optionally namespace-qualified, clear of generated names.
fn validate_function_name(name: &str) -> Result<(), ConfigurationError> {
    let is_ident = |part: &str| {
        let mut chars = part.chars();
        chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    if !name.split("::").all(is_ident) {
        return Err(ConfigurationError::InvalidIdentifier(name.to_string()));
    }
    if is_reserved(name) {
        return Err(ConfigurationError::ReservedName(name.to_string()));
    }
    Ok(())
}

fn parse_convolution(rows: &Rows) -> Result<ConvolutionPlan, ConfigurationError> {
    let Some((type_row, pattern_rows)) = rows.split_last() else {
        return Err(ConfigurationError::EmptyBlockBody {
            block: "convolution",
        });
    };

    let patterns = pattern_rows
        .iter()
        .map(|row| {
            let values = row
                .iter()
                .map(|t| parse_int("convolution", t))
                .collect::<Result<Vec<_>, _>>()?;
            match values.as_slice() {
                &[repeat_count, size, n_examples, size_param] => Ok(ConvolutionPattern {
                    repeat_count,
                    size,
                    n_examples,
                    size_param,
                }),
                _ => Err(ConfigurationError::MalformedConvolution(row.join(" "))),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let codes = type_row.first().map(String::as_str).unwrap_or_default();
    Ok(ConvolutionPlan {
        patterns,
        element_types: decode_type_codes(codes)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONF: &str = "\
# timing configuration
(dims
10 10
1000 1000
)

(n_total
1000000
)

(n_tests_min
5
)

(functions
# name (unique) function  roles  types
add         idx_add      iio    8u32f
sqrt        idx_sqrt     po     32f
div         idx_div      izo    16s
addc        idx_addc     iso    8u16s
)
trailing text is ignored
";

    #[test]
    fn test_parse_full_plan() {
        let plan = BenchmarkPlan::parse(CONF).unwrap();

        assert_eq!(plan.n_total, 1_000_000);
        assert_eq!(plan.n_tests_min, 5);
        assert_eq!(plan.dims.len(), 2);
        assert_eq!(plan.patterns[0].repeat_count, 10_000);
        assert_eq!(plan.patterns[0].shape.size(), 100);
        assert_eq!(plan.patterns[1].repeat_count, 5);
        assert!(plan.convolution.is_none());

        let names: Vec<&str> = plan.functions.iter().map(|f| f.test_name.as_str()).collect();
        assert_eq!(names, vec!["add", "sqrt", "div", "addc"]);
        let seeds: Vec<u64> = plan.functions.iter().map(|f| f.seed).collect();
        assert_eq!(seeds, vec![0, 1, 2, 3]);

        let add = &plan.functions[0];
        assert_eq!(add.function_name, "idx_add");
        assert_eq!(
            add.roles,
            vec![ParamRole::Input, ParamRole::Input, ParamRole::Output]
        );
        assert_eq!(
            add.element_types,
            vec![ElementType::UByte, ElementType::Float32]
        );
        assert_eq!(
            plan.functions[3].element_types,
            vec![ElementType::UByte, ElementType::Int16]
        );
    }

    #[test]
    fn test_reparse_is_identical() {
        let first = BenchmarkPlan::parse(CONF).unwrap();
        let second = BenchmarkPlan::parse(CONF).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_derive_pattern() {
        let small = derive_pattern(1_000_000, 5, Shape::new(vec![10, 10]).unwrap());
        assert_eq!(small.repeat_count, 10_000);
        let large = derive_pattern(1_000_000, 5, Shape::new(vec![1000, 1000]).unwrap());
        assert_eq!(large.repeat_count, 5);
        let tiny = derive_pattern(40, 2, Shape::new(vec![4]).unwrap());
        assert_eq!(tiny.repeat_count, 10);
    }

    #[test]
    fn test_missing_blocks() {
        let without = |name: &str| {
            let mut text = String::new();
            for (block, body) in [
                ("dims", "4"),
                ("n_total", "40"),
                ("n_tests_min", "2"),
                ("functions", "t f i 8u"),
            ] {
                if block != name {
                    text.push_str(&format!("({}\n{}\n)\n", block, body));
                }
            }
            BenchmarkPlan::parse(&text)
        };

        assert!(without("none").is_ok());
        assert_eq!(without("dims"), Err(ConfigurationError::MissingBlock("dims")));
        assert_eq!(
            without("n_total"),
            Err(ConfigurationError::MissingBlock("n_total"))
        );
        assert_eq!(
            without("n_tests_min"),
            Err(ConfigurationError::MissingBlock("n_tests_min"))
        );
        assert_eq!(
            without("functions"),
            Err(ConfigurationError::MissingBlock("functions"))
        );
    }

    #[test]
    fn test_missing_open_paren() {
        let result = BenchmarkPlan::parse("dims\n4\n)\n");
        assert_eq!(
            result,
            Err(ConfigurationError::MissingOpenParen("dims".to_string()))
        );
    }

    #[test]
    fn test_unknown_type_code_is_fatal() {
        let text = "(dims\n4\n)(n_total\n40\n)(n_tests_min\n2\n)(functions\nt f i 99x\n)";
        assert_eq!(
            BenchmarkPlan::parse(text),
            Err(ConfigurationError::UnknownTypeCode("99x".to_string()))
        );
    }

    #[test]
    fn test_invalid_rows() {
        let base = |dims: &str, min: &str, functions: &str| {
            format!(
                "(dims\n{}\n)(n_total\n40\n)(n_tests_min\n{}\n)(functions\n{}\n)",
                dims, min, functions
            )
        };

        assert!(matches!(
            BenchmarkPlan::parse(&base("4 x", "2", "t f i 8u")),
            Err(ConfigurationError::InvalidInteger { block: "dims", .. })
        ));
        assert!(matches!(
            BenchmarkPlan::parse(&base("4 0", "2", "t f i 8u")),
            Err(ConfigurationError::InvalidShape(_))
        ));
        assert_eq!(
            BenchmarkPlan::parse(&base("4", "0", "t f i 8u")),
            Err(ConfigurationError::ZeroRepeatFloor)
        );
        assert!(matches!(
            BenchmarkPlan::parse(&base("4", "2", "t f i")),
            Err(ConfigurationError::MalformedFunction(_))
        ));
        assert_eq!(
            BenchmarkPlan::parse(&base("4", "2", "t f i 8u\nt g i 8u")),
            Err(ConfigurationError::DuplicateTestName("t".to_string()))
        );
        assert_eq!(
            BenchmarkPlan::parse(&base("4", "2", "t A0 i 8u")),
            Err(ConfigurationError::ReservedName("A0".to_string()))
        );
        assert_eq!(
            BenchmarkPlan::parse(&base("4", "2", "t 1f i 8u")),
            Err(ConfigurationError::InvalidIdentifier("1f".to_string()))
        );
        assert!(matches!(
            BenchmarkPlan::parse(&base("4", "2", "t f iq 8u")),
            Err(ConfigurationError::UnknownRole { role: 'q', .. })
        ));
        assert!(BenchmarkPlan::parse(&base("4", "2", "t ebl::idx_add i 8u")).is_ok());
    }

    #[test]
    fn test_oversized_shapes_are_rejected() {
        let with_dims = |dims: &str| {
            BenchmarkPlan::parse(&format!(
                "(dims\n{}\n)(n_total\n40\n)(n_tests_min\n2\n)(functions\nt f i 8u\n)",
                dims
            ))
        };

        assert!(matches!(
            with_dims("4294967296 4294967296"),
            Err(ConfigurationError::InvalidShape(_))
        ));
        assert_eq!(
            with_dims("1 1 1 1 1 1 1 1 1"),
            Err(ConfigurationError::TooManyDimensions { rank: 9, max: 8 })
        );
        assert!(with_dims("1 1 1 1 1 1 1 1").is_ok());
    }

    #[test]
    fn test_functions_need_a_container() {
        let text = "(dims\n8\n)(n_total\n40\n)(n_tests_min\n2\n)(functions\nt f ss 8u\n)";
        assert_eq!(
            BenchmarkPlan::parse(text),
            Err(ConfigurationError::NoContainers)
        );
        let mixed = text.replace("t f ss 8u", "t f sis 8u");
        assert!(BenchmarkPlan::parse(&mixed).is_ok());
    }

    #[test]
    fn test_convolution_block() {
        let conf = CONF.replace("trailing text is ignored\n", "");
        let text = format!("{}(convolution\n10 32 100 5\n20 64 100 7\n32f8u\n)\n", conf);
        let plan = BenchmarkPlan::parse(&text).unwrap();
        let conv = plan.convolution.unwrap();
        assert_eq!(
            conv.patterns,
            vec![
                ConvolutionPattern {
                    repeat_count: 10,
                    size: 32,
                    n_examples: 100,
                    size_param: 5,
                },
                ConvolutionPattern {
                    repeat_count: 20,
                    size: 64,
                    n_examples: 100,
                    size_param: 7,
                },
            ]
        );
        assert_eq!(
            conv.element_types,
            vec![ElementType::Float32, ElementType::UByte]
        );

        let bad = format!("{}(convolution\n10 32 100\n32f\n)\n", conf);
        assert!(matches!(
            BenchmarkPlan::parse(&bad),
            Err(ConfigurationError::MalformedConvolution(_))
        ));
    }
}
