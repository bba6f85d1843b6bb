/// An entry in the error code registry.
pub struct ErrorEntry {
    pub code: &'static str,
    pub short: &'static str, // one-line summary, printed by --explain above the long text
    pub long: &'static str,
}

/// Every stable error code the VM and its front end can report.
pub static REGISTRY: &[ErrorEntry] = &[
    // ── Lexer ────────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "LOX-L001",
        short: "unexpected character",
        long: r#"## LOX-L001: unexpected character

The scanner met a character that starts no Lox token.

**Example:**

    1 + @

`@` is not part of the language. Remove it or replace it with an operator.
"#,
    },
    ErrorEntry {
        code: "LOX-L002",
        short: "unterminated string",
        long: r#"## LOX-L002: unterminated string

A string literal was opened with `"` but the source ended before the
closing quote. Strings may span lines, so the missing quote can be far
from where the literal starts.

**Example:**

    "hello + 1

**Fix:**

    "hello" + "1"
"#,
    },

    // ── Compiler ─────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "LOX-C001",
        short: "expected an expression",
        long: r#"## LOX-C001: expected an expression

The compiler needed an operand (a number, string, `true`, `false`, `nil`,
a unary operator or a parenthesised group) and found something else, or
the input ended.

**Examples:**

    1 +
    * 2
    print 1

Statements such as `print` are not supported; the input is a single
expression.
"#,
    },
    ErrorEntry {
        code: "LOX-C002",
        short: "missing ')' after grouped expression",
        long: r#"## LOX-C002: missing ')'

A `(` opened a group that was never closed.

**Example:**

    (1 + 2 * 3

**Fix:**

    (1 + 2) * 3
"#,
    },
    ErrorEntry {
        code: "LOX-C003",
        short: "tokens after the end of the expression",
        long: r#"## LOX-C003: expected end of expression

A complete expression was parsed but more tokens follow it. Only one
expression is compiled per input.

**Example:**

    1 2

Join the operands with an operator, e.g. `1 + 2`.
"#,
    },
    ErrorEntry {
        code: "LOX-C004",
        short: "too many constants in one chunk",
        long: r#"## LOX-C004: too many constants in one chunk

Constant operands are encoded in a single byte, so a chunk can hold at
most 256 constants. Every number or string literal takes one slot.

Split the computation across several inputs.
"#,
    },
    ErrorEntry {
        code: "LOX-C005",
        short: "expression nested too deeply",
        long: r#"## LOX-C005: expression nested too deeply

Parentheses and unary operators may nest at most 256 levels. Long flat
chains such as `1 + 2 + 3 + ...` do not count as nesting.

**Example:**

    ((((((...1...))))))
    - - - - - ... 1

Remove redundant parentheses or repeated signs (`- -x` is `x`).
"#,
    },

    // ── Runtime ──────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "LOX-R001",
        short: "stack overflow",
        long: r#"## LOX-R001: stack overflow

An instruction pushed a value onto a full operand stack. The capacity is
256 slots unless `--stack-capacity` or the config file says otherwise.
"#,
    },
    ErrorEntry {
        code: "LOX-R002",
        short: "stack underflow",
        long: r#"## LOX-R002: stack underflow

An instruction popped more operands than the stack held. The compiler
never emits such code; this points at a hand-assembled or corrupt chunk.
"#,
    },
    ErrorEntry {
        code: "LOX-R003",
        short: "division by zero",
        long: r#"## LOX-R003: division by zero

The right-hand operand of `/` evaluated to zero.

**Example:**

    1 / (2 - 2)
"#,
    },
    ErrorEntry {
        code: "LOX-R004",
        short: "unknown opcode",
        long: r#"## LOX-R004: unknown opcode

The dispatch loop read a byte that is not a valid instruction. Like
LOX-R002 this only happens for chunks that did not come from the compiler.
"#,
    },
    ErrorEntry {
        code: "LOX-R005",
        short: "instruction missing its operand",
        long: r#"## LOX-R005: truncated instruction

A `Constant` instruction was the last byte of the chunk, so its operand
byte is missing.
"#,
    },
    ErrorEntry {
        code: "LOX-R006",
        short: "constant index out of range",
        long: r#"## LOX-R006: constant index out of range

A `Constant` instruction named a slot past the end of the chunk's constant
table.
"#,
    },
    ErrorEntry {
        code: "LOX-R007",
        short: "operand type mismatch",
        long: r#"## LOX-R007: operand type mismatch

An operator was applied to values it does not accept.

- `+` takes two numbers or two strings.
- `-`, `*`, `/`, `<`, `>`, `<=`, `>=` take two numbers.
- unary `-` takes a number.

**Examples:**

    1 + true
    "a" * 2
    -nil

`==`, `!=` and `!` accept any values.
"#,
    },
    ErrorEntry {
        code: "LOX-R008",
        short: "reference to a freed object",
        long: r#"## LOX-R008: reference to a freed object

A value referred to a heap object that was already released by
`Vm::free`. Objects live until the VM that created them is freed, so a
value must not be carried across that point.
"#,
    },
    ErrorEntry {
        code: "LOX-R009",
        short: "instruction budget exhausted",
        long: r#"## LOX-R009: instruction budget exhausted

The run dispatched as many instructions as `--max-instructions` (or
`instruction_budget` in the config file) allows and was stopped.
"#,
    },
];

pub fn lookup(code: &str) -> Option<&'static ErrorEntry> {
    REGISTRY.iter().find(|e| e.code.eq_ignore_ascii_case(code))
}
