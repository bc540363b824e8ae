use pretty_assertions::assert_eq;
use pygenius::{EngineConfig, PyValue, Sandbox};

fn ints(values: &[i64]) -> PyValue {
    PyValue::from(values.to_vec())
}

#[test]
fn test_numeric_operators() {
    let mut sandbox = Sandbox::new();

    let cases = [
        ("7 + 5 * 2", PyValue::Int(17)),
        ("(7 + 5) * 2", PyValue::Int(24)),
        ("9 / 2", PyValue::Float(4.5)),
        ("9 // 2", PyValue::Int(4)),
        ("-9 // 2", PyValue::Int(-5)),
        ("-9 % 4", PyValue::Int(3)),
        ("3 ** 4", PyValue::Int(81)),
        ("1 + 0.5", PyValue::Float(1.5)),
        ("True + True", PyValue::Int(2)),
    ];
    for (code, expected) in cases {
        assert_eq!(sandbox.execute(code).unwrap(), expected, "{code}");
    }
}

#[test]
fn test_namespace_persists() {
    let mut sandbox = Sandbox::new();

    sandbox.execute("price = 4").unwrap();
    sandbox.execute("qty = price * 3").unwrap();
    assert_eq!(sandbox.execute("price + qty").unwrap(), PyValue::Int(16));
}

#[test]
fn test_strings() {
    let mut sandbox = Sandbox::new();

    assert_eq!(
        sandbox.execute("'hello' + ' ' + 'world'").unwrap(),
        PyValue::from("hello world")
    );
    assert_eq!(sandbox.execute("'ab' * 3").unwrap(), PyValue::from("ababab"));
    assert_eq!(
        sandbox.execute("'a,b,c'.split(',')").unwrap(),
        PyValue::from(vec!["a", "b", "c"])
    );
    assert_eq!(
        sandbox.execute("'-'.join(['x', 'y'])").unwrap(),
        PyValue::from("x-y")
    );
    assert_eq!(
        sandbox.execute("'  Padded  '.strip().upper()").unwrap(),
        PyValue::from("PADDED")
    );
}

#[test]
fn test_fstrings() {
    let mut sandbox = Sandbox::new();
    sandbox.set_variable("name", "Ada");
    sandbox.set_variable("score", 91.256);

    assert_eq!(
        sandbox.execute("f'{name} scored {score:.1f}'").unwrap(),
        PyValue::from("Ada scored 91.3")
    );
    assert_eq!(
        sandbox.execute("f'{name!r}'").unwrap(),
        PyValue::from("'Ada'")
    );
}

#[test]
fn test_lists_and_slices() {
    let mut sandbox = Sandbox::new();

    sandbox.execute("nums = [10, 20, 30, 40]").unwrap();
    assert_eq!(sandbox.execute("nums[0]").unwrap(), PyValue::Int(10));
    assert_eq!(sandbox.execute("nums[-1]").unwrap(), PyValue::Int(40));
    assert_eq!(sandbox.execute("nums[1:3]").unwrap(), ints(&[20, 30]));
    assert_eq!(sandbox.execute("nums[::-2]").unwrap(), ints(&[40, 20]));

    sandbox.execute("nums.append(50)\nnums[0] = 5").unwrap();
    assert_eq!(sandbox.execute("nums").unwrap(), ints(&[5, 20, 30, 40, 50]));
}

#[test]
fn test_dicts() {
    let mut sandbox = Sandbox::new();

    sandbox.execute("data = {'name': 'Alice', 'age': 30}").unwrap();
    assert_eq!(sandbox.execute("data['age']").unwrap(), PyValue::Int(30));
    assert_eq!(
        sandbox.execute("data.get('city', 'unknown')").unwrap(),
        PyValue::from("unknown")
    );

    sandbox.execute("data['age'] += 1").unwrap();
    assert_eq!(sandbox.execute("data['age']").unwrap(), PyValue::Int(31));
    assert_eq!(
        sandbox.execute("list(data.keys())").unwrap(),
        PyValue::from(vec!["name", "age"])
    );
}

#[test]
fn test_missing_key() {
    let mut sandbox = Sandbox::new();
    let err = sandbox.execute("{'a': 1}['b']").unwrap_err();
    assert_eq!(err.to_string(), "KeyError: 'b'");
}

#[test]
fn test_control_flow() {
    let mut sandbox = Sandbox::new();

    let code = r#"
total = 0
for i in range(10):
    if i % 2 == 0:
        continue
    if i > 7:
        break
    total += i
total
"#;
    assert_eq!(sandbox.execute(code).unwrap(), PyValue::Int(1 + 3 + 5 + 7));

    let code = r#"
n = 0
while n < 3:
    n += 1
else:
    n = 100
n
"#;
    assert_eq!(sandbox.execute(code).unwrap(), PyValue::Int(100));
}

#[test]
fn test_functions() {
    let mut sandbox = Sandbox::new();

    let code = r#"
def greet(name, greeting="Hello", *rest, **extra):
    return f"{greeting}, {name}" + "!" * len(rest) + str(len(extra))

greet("Bo"), greet("Bo", "Hi", 1, 2, mood="good")
"#;
    assert_eq!(
        sandbox.execute(code).unwrap(),
        PyValue::Tuple(vec![
            PyValue::from("Hello, Bo0"),
            PyValue::from("Hi, Bo!!1"),
        ])
    );
}

#[test]
fn test_recursion() {
    let mut sandbox = Sandbox::new();

    let code = r#"
def fib(n):
    if n < 2:
        return n
    return fib(n - 1) + fib(n - 2)

fib(15)
"#;
    assert_eq!(sandbox.execute(code).unwrap(), PyValue::Int(610));
}

#[test]
fn test_recursion_limit() {
    let mut sandbox = Sandbox::with_config(EngineConfig::default().with_recursion_limit(30));
    let err = sandbox
        .execute("def down(n):\n    return down(n + 1)\ndown(0)")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "RecursionError: maximum recursion depth exceeded"
    );
}

#[test]
fn test_lambda_and_builtins() {
    let mut sandbox = Sandbox::new();

    assert_eq!(
        sandbox
            .execute("sorted(['pear', 'fig', 'apple'], key=lambda s: len(s))")
            .unwrap(),
        PyValue::from(vec!["fig", "pear", "apple"])
    );
    assert_eq!(
        sandbox.execute("list(map(lambda x: x * x, [1, 2, 3]))").unwrap(),
        ints(&[1, 4, 9])
    );
    assert_eq!(
        sandbox.execute("sum(x for x in range(5) if x % 2)").unwrap(),
        PyValue::Int(4)
    );
    assert_eq!(
        sandbox.execute("max([3, 9, 2]), min(4, 1), abs(-2)").unwrap(),
        PyValue::Tuple(vec![PyValue::Int(9), PyValue::Int(1), PyValue::Int(2)])
    );
    assert_eq!(
        sandbox.execute("list(enumerate('ab'))").unwrap(),
        PyValue::list(vec![
            PyValue::Tuple(vec![PyValue::Int(0), PyValue::from("a")]),
            PyValue::Tuple(vec![PyValue::Int(1), PyValue::from("b")]),
        ])
    );
}

#[test]
fn test_comprehensions() {
    let mut sandbox = Sandbox::new();

    assert_eq!(
        sandbox.execute("[x * 2 for x in range(4)]").unwrap(),
        ints(&[0, 2, 4, 6])
    );
    assert_eq!(
        sandbox
            .execute("{k: v for k, v in [('a', 1), ('b', 2)]}")
            .unwrap(),
        PyValue::dict(vec![
            (PyValue::from("a"), PyValue::Int(1)),
            (PyValue::from("b"), PyValue::Int(2)),
        ])
    );
    assert_eq!(
        sandbox.execute("[(i, j) for i in range(2) for j in range(i)]").unwrap(),
        PyValue::list(vec![PyValue::Tuple(vec![PyValue::Int(1), PyValue::Int(0)])])
    );
}

#[test]
fn test_shared_containers() {
    let mut sandbox = Sandbox::new();

    sandbox.execute("a = [1, 2]\nb = a\nb.append(3)").unwrap();
    assert_eq!(sandbox.execute("a").unwrap(), ints(&[1, 2, 3]));
    assert_eq!(sandbox.execute("a is b").unwrap(), PyValue::Bool(true));

    sandbox.execute("c = a.copy()\nc.append(4)").unwrap();
    assert_eq!(sandbox.execute("a").unwrap(), ints(&[1, 2, 3]));

    sandbox.execute("grid = [[0], [0]]\ngrid[1].append(7)").unwrap();
    assert_eq!(
        sandbox.execute("grid").unwrap(),
        PyValue::list(vec![ints(&[0]), ints(&[0, 7])])
    );

    sandbox.execute("rows = [[0] * 2] * 2\nrows[0][0] = 1").unwrap();
    assert_eq!(
        sandbox.execute("rows").unwrap(),
        PyValue::list(vec![ints(&[1, 0]), ints(&[1, 0])])
    );
}

#[test]
fn test_arguments_are_mutated_in_place() {
    let mut sandbox = Sandbox::new();

    let code = "\
def add(items, x):
    items.append(x)
cart = []
add(cart, 'apple')
print(cart)
";
    let output = sandbox.execute_with_output(code).unwrap();
    assert_eq!(output.stdout, "['apple']\n");

    let code = "\
def tally(counts, word):
    counts[word] = counts.get(word, 0) + 1
    counts['total'] += 1
seen = {'total': 0}
tally(seen, 'hi')
tally(seen, 'hi')
";
    sandbox.execute(code).unwrap();
    assert_eq!(
        sandbox.execute("seen").unwrap(),
        PyValue::dict(vec![
            (PyValue::from("total"), PyValue::Int(2)),
            (PyValue::from("hi"), PyValue::Int(2)),
        ])
    );

    sandbox.execute("xs = [1]\nys = xs\nxs += [2]").unwrap();
    assert_eq!(sandbox.execute("ys").unwrap(), ints(&[1, 2]));
}

#[test]
fn test_methods_on_temporaries() {
    let mut sandbox = Sandbox::new();

    assert_eq!(
        sandbox.execute("nums = [3, 1, 2]\nsorted(nums).pop()").unwrap(),
        PyValue::Int(3)
    );
    assert_eq!(sandbox.execute("nums").unwrap(), ints(&[3, 1, 2]));

    let code = "\
def make():
    return [1, 2]
make().pop()
";
    assert_eq!(sandbox.execute(code).unwrap(), PyValue::Int(2));

    sandbox
        .execute("d = {}\nd.setdefault('k', []).append(1)")
        .unwrap();
    assert_eq!(
        sandbox.execute("d").unwrap(),
        PyValue::dict(vec![(PyValue::from("k"), ints(&[1]))])
    );

    sandbox
        .execute("d['k'].extend([4, 2])\nd['k'].sort(key=lambda v: -v)")
        .unwrap();
    assert_eq!(sandbox.execute("d['k']").unwrap(), ints(&[4, 2, 1]));
}

#[test]
fn test_read_before_local_assignment() {
    let mut sandbox = Sandbox::new();

    let code = "\
x = 10
def f():
    print(x)
    x = 1
f()
";
    let err = sandbox.execute(code).unwrap_err();
    assert_eq!(
        err.to_string(),
        "UnboundLocalError: cannot access local variable 'x' where it is not associated with a value"
    );
    assert_eq!(err.category(), "UnboundLocalError");

    let code = "\
count = 0
def bump():
    global count
    count += 1
def peek():
    return count
bump()
";
    sandbox.execute(code).unwrap();
    assert_eq!(sandbox.execute("peek()").unwrap(), PyValue::Int(1));
}

#[test]
fn test_delete_slices() {
    let mut sandbox = Sandbox::new();

    sandbox
        .execute("x = list(range(6))\ndel x[::2]\ndel x[:1]")
        .unwrap();
    assert_eq!(sandbox.execute("x").unwrap(), ints(&[3, 5]));

    let err = sandbox.execute("t = (1, 2)\ndel t[:1]").unwrap_err();
    assert_eq!(
        err.to_string(),
        "TypeError: 'tuple' object doesn't support item deletion"
    );
}

#[test]
fn test_exception_handling() {
    let mut sandbox = Sandbox::new();

    let code = r#"
log = []
try:
    [1][3]
except LookupError as e:
    log.append(str(e))
else:
    log.append("no error")
finally:
    log.append("done")
log
"#;
    assert_eq!(
        sandbox.execute(code).unwrap(),
        PyValue::from(vec!["list index out of range", "done"])
    );

    let code = r#"
try:
    raise ValueError("bad value")
except (TypeError, ValueError) as e:
    caught = type(e).__name__
caught
"#;
    assert_eq!(sandbox.execute(code).unwrap(), PyValue::from("ValueError"));
}

#[test]
fn test_uncaught_raise() {
    let mut sandbox = Sandbox::new();
    let err = sandbox.execute("raise RuntimeError('stop')").unwrap_err();
    assert_eq!(err.category(), "RuntimeError");
    assert_eq!(err.message(), "stop");

    let err = sandbox.execute("assert 1 == 2, 'math broke'").unwrap_err();
    assert_eq!(err.to_string(), "AssertionError: math broke");
}

#[test]
fn test_name_error() {
    let mut sandbox = Sandbox::new();
    let err = sandbox.execute("undefined_thing + 1").unwrap_err();
    assert_eq!(err.to_string(), "NameError: name 'undefined_thing' is not defined");
}

#[test]
fn test_input_has_no_stdin() {
    let mut sandbox = Sandbox::new();
    let err = sandbox.execute("input('name? ')").unwrap_err();
    assert_eq!(err.category(), "EOFError");
}

#[test]
fn test_unsupported_constructs() {
    let mut sandbox = Sandbox::new();
    let err = sandbox.execute("class Point:\n    pass").unwrap_err();
    assert_eq!(
        err.to_string(),
        "NotImplementedError: class definition is not supported"
    );

    let err = sandbox
        .execute("def deco(f):\n    return f\n@deco\ndef g():\n    pass")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "NotImplementedError: a decorator is not supported"
    );
}

#[test]
fn test_imports() {
    let mut sandbox = Sandbox::new();

    assert_eq!(
        sandbox.execute("import math\nmath.sqrt(16)").unwrap(),
        PyValue::Float(4.0)
    );
    assert_eq!(
        sandbox.execute("from math import floor as fl\nfl(2.7)").unwrap(),
        PyValue::Int(2)
    );
    assert_eq!(
        sandbox.execute("import json\njson.loads('[1, 2]')").unwrap(),
        ints(&[1, 2])
    );

    let err = sandbox.execute("import requests").unwrap_err();
    assert_eq!(err.category(), "ModuleNotFoundError");
}

#[test]
fn test_numpy_arrays() {
    let mut sandbox = Sandbox::new();

    sandbox
        .execute("import numpy as np\ngrid = np.array([[1, 2, 3], [4, 5, 6]])")
        .unwrap();
    assert_eq!(
        sandbox.execute("grid.shape").unwrap(),
        PyValue::Tuple(vec![PyValue::Int(2), PyValue::Int(3)])
    );
    assert_eq!(sandbox.execute("grid.size").unwrap(), PyValue::Int(6));
    assert_eq!(sandbox.execute("float(grid.mean())").unwrap(), PyValue::Float(3.5));
    assert_eq!(
        sandbox.execute("(grid * 2).tolist()[1]").unwrap(),
        ints(&[8, 10, 12])
    );
    assert_eq!(
        sandbox.execute("np.zeros(3).shape").unwrap(),
        PyValue::Tuple(vec![PyValue::Int(3)])
    );
}

#[test]
fn test_pandas_frames() {
    let mut sandbox = Sandbox::new();

    sandbox
        .execute("import pandas as pd\ndf = pd.DataFrame({'a': [1, 2, 3], 'b': [4, 5, 6]})")
        .unwrap();
    assert_eq!(
        sandbox.execute("df.shape").unwrap(),
        PyValue::Tuple(vec![PyValue::Int(3), PyValue::Int(2)])
    );
    assert_eq!(sandbox.execute("df['b'].tolist()").unwrap(), ints(&[4, 5, 6]));
    assert_eq!(sandbox.execute("len(df.head(2))").unwrap(), PyValue::Int(2));
}

#[test]
fn test_output_capture() {
    let mut sandbox = Sandbox::new();

    let output = sandbox
        .execute_with_output("print('a', 'b', sep='-', end='!')\nprint()\n42")
        .unwrap();
    assert_eq!(output.stdout, "a-b!\n");
    assert_eq!(output.stderr, "");
    assert_eq!(output.result, PyValue::Int(42));
    assert!(output.has_output());
}
