//! Program Synthesis
//!
//! Emits one complete, self-contained source unit per timed case:
//!
//! ```text
//! prelude                      (headers, entry point, optional runtime init)
//! container declarations       A0, A1, ... at the case's shape
//! descending fill loops        for (i<k> = d<k>-1; i<k> >= 0; --i<k>)
//!   store value expression     one fresh ValueExpr per container
//!   nonzero fix-up             if (load == 0) store 1
//! timer start
//! commands                     verbatim
//! timer end                    prints `start_s start_us end_s end_us` last
//! epilogue
//! ```
//!
//! The fill loops and command placement are generic; everything API-specific
//! (container type, element access, timer calls) comes from a [`ProgramBackend`].

use crate::{ConfigurationError, ElementType, REPEAT_VAR, SINK_VAR, Shape, ValueExpr};
use rand::Rng;
use std::fmt::Write as _;

/// Value constraints applied while filling a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerFlags {
    /// Values are wrapped in an absolute value
    pub positive: bool,
    /// Zeros are replaced by 1 after filling
    pub nonzero: bool,
}

impl ContainerFlags {
    /// No constraint
    pub const PLAIN: Self = Self {
        positive: false,
        nonzero: false,
    };
    /// Non-negative values
    pub const POSITIVE: Self = Self {
        positive: true,
        nonzero: false,
    };
    /// No zero values
    pub const NONZERO: Self = Self {
        positive: false,
        nonzero: true,
    };
}

/// A container in the generated program.
///
/// Names follow the reserved `A<k>` scheme, `k` being the parameter position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedContainer {
    name: String,
    flags: ContainerFlags,
}

impl NamedContainer {
    /// Container for the parameter at `position`
    pub fn for_parameter(position: usize, flags: ContainerFlags) -> Self {
        Self {
            name: format!("A{}", position),
            flags,
        }
    }

    /// Name in the generated program
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fill constraints
    pub fn flags(&self) -> ContainerFlags {
        self.flags
    }
}

/// `prefix` followed by one or more ASCII digits
fn is_numbered(name: &str, prefix: char) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// Whether `name` collides with identifiers the synthesizer generates itself.
pub(crate) fn is_reserved(name: &str) -> bool {
    is_numbered(name, 'A') || is_numbered(name, 'i') || name == REPEAT_VAR || name == SINK_VAR
}

/// Target-API specific pieces of a generated program.
pub trait ProgramBackend {
    /// Headers and the opening of the entry point
    fn prelude(&self, out: &mut String);

    /// Declare every container at `shape`
    fn declare_containers(
        &self,
        out: &mut String,
        indent: &str,
        containers: &[NamedContainer],
        element_type: ElementType,
        shape: &Shape,
    );

    /// Statement storing `value` at `indices` (comma-separated index variables)
    fn store(&self, container: &str, value: &str, indices: &str) -> String;

    /// Expression reading the element at `indices`
    fn load(&self, container: &str, indices: &str) -> String;

    /// Start the wall-clock timer
    fn timer_start(&self, out: &mut String, indent: &str);

    /// Stop the timer and print `start_s start_us end_s end_us` as the last output line
    fn timer_end(&self, out: &mut String, indent: &str);

    /// Close the entry point
    fn epilogue(&self, out: &mut String);
}

/// Everything needed to emit one program.
#[derive(Debug, Clone, Copy)]
pub struct ProgramSpec<'a> {
    /// Containers to declare and fill
    pub containers: &'a [NamedContainer],
    /// Element type of every container
    pub element_type: ElementType,
    /// Shape of every container
    pub shape: &'a Shape,
    /// Statements to time, emitted verbatim
    pub commands: &'a [String],
}

/// Emit a complete program.
///
/// One fill expression is drawn from `rng` per container, in declaration order.
pub fn emit_program<R: Rng + ?Sized>(
    backend: &dyn ProgramBackend,
    spec: &ProgramSpec<'_>,
    rng: &mut R,
) -> Result<String, ConfigurationError> {
    if spec.containers.is_empty() {
        return Err(ConfigurationError::NoContainers);
    }
    for (k, container) in spec.containers.iter().enumerate() {
        if spec.containers[..k]
            .iter()
            .any(|c| c.name() == container.name())
        {
            return Err(ConfigurationError::DuplicateContainer(
                container.name().to_string(),
            ));
        }
    }

    let rank = spec.shape.rank();
    let exprs = spec
        .containers
        .iter()
        .map(|c| ValueExpr::draw(rng, spec.element_type, rank, c.flags().positive))
        .collect::<Result<Vec<_>, _>>()?;

    let indent = "  ";
    let mut code = String::new();
    backend.prelude(&mut code);

    code.push_str(indent);
    code.push_str("// containers\n");
    backend.declare_containers(
        &mut code,
        indent,
        spec.containers,
        spec.element_type,
        spec.shape,
    );

    let index_vars: Vec<String> = (0..rank).map(|k| format!("i{}", k)).collect();
    let indices = index_vars.join(", ");
    let _ = writeln!(code, "{}int {};", indent, indices);

    let mut loop_indent = indent.to_string();
    for (k, dim) in spec.shape.dims().iter().enumerate() {
        let brace = if k + 1 == rank { " {" } else { "" };
        let _ = writeln!(
            code,
            "{}for ({var} = {}; {var} >= 0; --{var}){}",
            loop_indent,
            dim - 1,
            brace,
            var = index_vars[k]
        );
        loop_indent.push_str("  ");
    }

    let one = format!("({})1", spec.element_type.name());
    for (container, expr) in spec.containers.iter().zip(&exprs) {
        let _ = writeln!(
            code,
            "{}{}",
            loop_indent,
            backend.store(container.name(), &expr.render(), &indices)
        );
        if container.flags().nonzero {
            let _ = writeln!(
                code,
                "{}if ({} == 0)",
                loop_indent,
                backend.load(container.name(), &indices)
            );
            let _ = writeln!(
                code,
                "{}  {}",
                loop_indent,
                backend.store(container.name(), &one, &indices)
            );
        }
    }
    let _ = writeln!(code, "{}}}", &loop_indent[..loop_indent.len() - 2]);

    code.push_str(indent);
    code.push_str("// timing\n");
    backend.timer_start(&mut code, indent);
    for command in spec.commands {
        let _ = writeln!(code, "{}{}", indent, command);
    }
    backend.timer_end(&mut code, indent);
    backend.epilogue(&mut code);

    Ok(code)
}

/// Backend for the `idx` tensor library with `gettimeofday` timing.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdxBackend {
    /// Worker threads for the vendor library (0 = leave uninitialised)
    pub n_cores: u32,
}

impl IdxBackend {
    /// Backend initialising the vendor library with `n_cores` threads when non-zero
    pub fn new(n_cores: u32) -> Self {
        Self { n_cores }
    }
}

impl ProgramBackend for IdxBackend {
    fn prelude(&self, out: &mut String) {
        out.push_str("#include <cstdio>\n");
        out.push_str("#include <cstdlib>\n");
        out.push_str("#include <cmath>\n");
        out.push_str("#include <sys/time.h>\n");
        out.push_str("#include \"eblearn/idxops.h\"\n");
        out.push_str("using namespace ebl;\n");
        out.push('\n');
        out.push_str("int main() {\n");
        if self.n_cores != 0 {
            let _ = writeln!(out, "  ipp_init({});", self.n_cores);
        }
    }

    fn declare_containers(
        &self,
        out: &mut String,
        indent: &str,
        containers: &[NamedContainer],
        element_type: ElementType,
        shape: &Shape,
    ) {
        let dims: Vec<String> = shape.dims().iter().map(|d| d.to_string()).collect();
        let dims = dims.join(", ");
        let decls: Vec<String> = containers
            .iter()
            .map(|c| format!("{} ({})", c.name(), dims))
            .collect();
        let _ = writeln!(
            out,
            "{}idx<{}> {};",
            indent,
            element_type.name(),
            decls.join(", ")
        );
    }

    fn store(&self, container: &str, value: &str, indices: &str) -> String {
        format!("{}.set({}, {});", container, value, indices)
    }

    fn load(&self, container: &str, indices: &str) -> String {
        format!("{}.get({})", container, indices)
    }

    fn timer_start(&self, out: &mut String, indent: &str) {
        let _ = writeln!(out, "{}struct timeval timer_init, timer_end;", indent);
        let _ = writeln!(out, "{}gettimeofday(&timer_init, NULL);", indent);
    }

    fn timer_end(&self, out: &mut String, indent: &str) {
        let _ = writeln!(out, "{}gettimeofday(&timer_end, NULL);", indent);
        let _ = writeln!(
            out,
            "{}printf(\"%lld %06d %lld %06d\\n\", (long long int)timer_init.tv_sec, \
             (int)timer_init.tv_usec, (long long int)timer_end.tv_sec, (int)timer_end.tv_usec);",
            indent
        );
    }

    fn epilogue(&self, out: &mut String) {
        out.push_str("  return 0;\n");
        out.push_str("}\n");
    }
}
