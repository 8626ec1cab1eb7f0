//! Goal-stack machine that runs one query.
//!
//! The machine pops goals off a stack until it either needs the host (it
//! then returns an event and waits for the matching answer) or the stack
//! is empty (a solution). Choice points snapshot the goal stack and the
//! length of the binding trail; backtracking restores both and resumes the
//! next alternative.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use crate::engine::{EngineResult, QueryEvent};
use crate::error::ErrorPayload;
use crate::term::{
    CallId, Dictionary, ExternalInstance, InstanceId, InstanceLiteral, Symbol, Term, Value,
};
use super::program::{Comparison, Goal, KnowledgeBase, Param, Rule};


// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Step {
    Goal(Goal),
    /// Ask the host for the next value of an attribute. Re-running the
    /// same step after backtracking re-asks the same `call_id`.
    External(ExternalLookup),
    ExternalUnify(InstanceId, InstanceId),
    /// Consume the host's yes/no answer; continue only on the given one.
    CheckAnswer(bool),
    Filter(Filter),
    Sort(Sort),
}

#[derive(Debug, Clone)]
struct ExternalLookup {
    call_id: CallId,
    instance_id: InstanceId,
    attribute: String,
    args: Vec<Term>,
    result: Symbol,
}

/// Dropping rules whose specializers the arguments do not satisfy.
#[derive(Debug, Clone)]
struct Filter {
    args: Vec<Term>,
    candidates: VecDeque<Arc<Rule>>,
    /// Rule being checked and the index of the parameter under question.
    current: Option<(Arc<Rule>, usize)>,
    applicable: Vec<Arc<Rule>>,
    asked: bool,
}

/// Insertion sort of applicable rules, most specific first.
#[derive(Debug, Clone)]
struct Sort {
    args: Vec<Term>,
    unsorted: VecDeque<Arc<Rule>>,
    sorted: Vec<Arc<Rule>>,
    /// Rule being inserted and the position it is compared against.
    inserting: Option<(Arc<Rule>, usize)>,
    asked: bool,
}

#[derive(Debug)]
struct Choice {
    goals: Vec<Step>,
    trail_len: usize,
    alternatives: VecDeque<Vec<Step>>,
}

#[derive(Debug)]
enum Awaiting {
    Call(ExternalLookup),
    Question(CallId),
    Debug,
}

enum Flow {
    Continue,
    Fail,
    Emit(QueryEvent),
}

enum Check {
    Pass,
    Reject,
    Ask(InstanceId, String),
}

enum Order {
    Before,
    After,
    Ask(InstanceId, String, String),
}


// ---------------------------------------------------------------------------
// Vm
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Vm {
    goals: Vec<Step>,
    bindings: HashMap<String, Term>,
    trail: Vec<String>,
    choices: Vec<Choice>,
    /// Variables reported in each solution.
    vars: Vec<String>,
    awaiting: Option<Awaiting>,
    answer: Option<bool>,
    next_call_id: CallId,
    renames: u64,
    done: bool,
}

/// Bump `counter` and return the new value; `None` once it would overflow.
pub fn next_handle(counter: &mut InstanceId) -> Option<InstanceId> {
    *counter = counter.checked_add(1)?;
    Some(*counter)
}

fn protocol(msg: impl Into<String>) -> ErrorPayload {
    ErrorPayload::runtime("ProtocolError", msg)
}

impl Vm {
    pub fn new(goals: Vec<Goal>, vars: Vec<String>) -> Self {
        Vm {
            goals: goals.into_iter().rev().map(Step::Goal).collect(),
            bindings: HashMap::new(),
            trail: Vec::new(),
            choices: Vec::new(),
            vars,
            awaiting: None,
            answer: None,
            next_call_id: 0,
            renames: 0,
            done: false,
        }
    }

    // -----------------------------------------------------------------------
    // Protocol
    // -----------------------------------------------------------------------

    pub fn next_event(
        &mut self,
        kb: &KnowledgeBase,
        handles: &mut InstanceId,
    ) -> EngineResult<QueryEvent> {
        if let Some(awaiting) = &self.awaiting {
            return Err(protocol(format!("query is still waiting on {:?}", awaiting)));
        }
        loop {
            if self.done {
                return Ok(QueryEvent::Done);
            }
            let step = match self.goals.pop() {
                Some(step) => step,
                None => {
                    let bindings = self.solution();
                    self.backtrack();
                    return Ok(QueryEvent::Result { bindings });
                }
            };
            match self.run(step, kb, handles)? {
                Flow::Continue => {}
                Flow::Fail => self.backtrack(),
                Flow::Emit(event) => return Ok(event),
            }
        }
    }

    pub fn call_result(&mut self, call_id: CallId, value: Option<Term>) -> EngineResult<()> {
        let call = match self.awaiting.take() {
            Some(Awaiting::Call(call)) if call.call_id == call_id => call,
            other => {
                self.awaiting = other;
                return Err(protocol(format!("unexpected result for call {}", call_id)));
            }
        };
        match value {
            Some(term) => {
                let result = Term::new(Value::Symbol(call.result.clone()));
                self.choices.push(Choice {
                    goals: self.goals.clone(),
                    trail_len: self.trail.len(),
                    alternatives: VecDeque::from(vec![vec![Step::External(call)]]),
                });
                self.goals.push(Step::Goal(Goal::Unify(result, term)));
            }
            None => self.backtrack(),
        }
        Ok(())
    }

    pub fn question_result(&mut self, call_id: CallId, answer: bool) -> EngineResult<()> {
        match self.awaiting.take() {
            Some(Awaiting::Question(id)) if id == call_id => {
                self.answer = Some(answer);
                Ok(())
            }
            other => {
                self.awaiting = other;
                Err(protocol(format!("unexpected answer for call {}", call_id)))
            }
        }
    }

    pub fn debug_command(&mut self) -> EngineResult<()> {
        match self.awaiting.take() {
            Some(Awaiting::Debug) => Ok(()),
            other => {
                self.awaiting = other;
                Err(protocol("no debug prompt is pending"))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    fn run(&mut self, step: Step, kb: &KnowledgeBase, handles: &mut InstanceId) -> EngineResult<Flow> {
        match step {
            Step::Goal(goal) => self.run_goal(goal, kb, handles),
            Step::External(call) => {
                let event = QueryEvent::ExternalCall {
                    call_id: call.call_id,
                    instance_id: call.instance_id,
                    attribute: call.attribute.clone(),
                    args: call.args.clone(),
                };
                self.awaiting = Some(Awaiting::Call(call));
                Ok(Flow::Emit(event))
            }
            Step::ExternalUnify(left, right) => {
                self.goals.push(Step::CheckAnswer(true));
                Ok(self.ask(|call_id| QueryEvent::ExternalUnify {
                    call_id,
                    left_instance_id: left,
                    right_instance_id: right,
                }))
            }
            Step::CheckAnswer(want) => Ok(pass_if(self.take_answer()? == want)),
            Step::Filter(filter) => self.filter(filter),
            Step::Sort(sort) => self.sort(sort),
        }
    }

    fn run_goal(&mut self, goal: Goal, kb: &KnowledgeBase, handles: &mut InstanceId) -> EngineResult<Flow> {
        match goal {
            Goal::Call(call) => {
                let rules = kb.rules_for(&call.name, call.args.len());
                if rules.is_empty() {
                    return Ok(Flow::Fail);
                }
                self.goals.push(Step::Filter(Filter {
                    args: call.args,
                    candidates: rules.into(),
                    current: None,
                    applicable: Vec::new(),
                    asked: false,
                }));
                Ok(Flow::Continue)
            }
            Goal::Unify(left, right) => {
                let mut deferred = Vec::new();
                if !self.unify(&left, &right, &mut deferred) {
                    return Ok(Flow::Fail);
                }
                for (l, r) in deferred.into_iter().rev() {
                    self.goals.push(Step::ExternalUnify(l, r));
                }
                Ok(Flow::Continue)
            }
            Goal::Compare(op, left, right) => {
                let left = self.resolve(&left);
                let right = self.resolve(&right);
                if let (Comparison::Neq, Value::ExternalInstance(l), Value::ExternalInstance(r)) =
                    (op, &left.value, &right.value)
                {
                    if l.instance_id != r.instance_id {
                        let (l, r) = (l.instance_id, r.instance_id);
                        self.goals.push(Step::CheckAnswer(false));
                        return Ok(self.ask(|call_id| QueryEvent::ExternalUnify {
                            call_id,
                            left_instance_id: l,
                            right_instance_id: r,
                        }));
                    }
                }
                let holds = compare(op, &left.value, &right.value)?;
                Ok(if holds { Flow::Continue } else { Flow::Fail })
            }
            Goal::Matches(term, class_tag) => match self.walk(&term).value {
                Value::ExternalInstance(ExternalInstance { instance_id }) => {
                    self.goals.push(Step::CheckAnswer(true));
                    Ok(self.ask(|call_id| QueryEvent::ExternalIsa {
                        call_id,
                        instance_id,
                        class_tag,
                    }))
                }
                Value::InstanceLiteral(lit) => Ok(pass_if(lit.tag == class_tag)),
                other => Ok(pass_if(other.tag() == class_tag)),
            },
            Goal::Lookup { target, attribute, args, result } => {
                self.lookup(target, attribute, args, result)
            }
            Goal::Make { literal, result } => {
                let instance_id = next_handle(handles)
                    .ok_or_else(|| ErrorPayload::runtime("EngineExhausted", "no instance handles left"))?;
                let instance = InstanceLiteral {
                    tag: literal.tag,
                    fields: self.resolve_dict(&literal.fields),
                };
                self.bind(
                    &result,
                    Term::new(Value::ExternalInstance(ExternalInstance { instance_id })),
                );
                Ok(Flow::Emit(QueryEvent::MakeExternal { instance_id, instance }))
            }
            Goal::Debug(message) => {
                self.awaiting = Some(Awaiting::Debug);
                Ok(Flow::Emit(QueryEvent::Debug { message }))
            }
            Goal::Or(branches) => {
                let alternatives = branches
                    .into_iter()
                    .map(|goals| goals.into_iter().map(Step::Goal).collect())
                    .collect();
                Ok(self.fork(alternatives))
            }
        }
    }

    fn lookup(
        &mut self,
        target: Term,
        attribute: String,
        args: Vec<Term>,
        result: Symbol,
    ) -> EngineResult<Flow> {
        let fields = match self.walk(&target).value {
            Value::ExternalInstance(ExternalInstance { instance_id }) => {
                let args = args.iter().map(|a| self.resolve(a)).collect();
                let call_id = self.fresh_call_id();
                self.goals.push(Step::External(ExternalLookup {
                    call_id,
                    instance_id,
                    attribute,
                    args,
                    result,
                }));
                return Ok(Flow::Continue);
            }
            Value::Dictionary(dict) => dict,
            Value::InstanceLiteral(lit) => lit.fields,
            Value::Symbol(var) => {
                return Err(ErrorPayload::runtime(
                    "UnboundVariable",
                    format!("cannot look up '{}' on unbound variable {}", attribute, var),
                ))
            }
            _ => return Ok(Flow::Fail),
        };
        match fields.fields.get(&attribute) {
            Some(value) if args.is_empty() => {
                let result = Term::new(Value::Symbol(result));
                self.goals.push(Step::Goal(Goal::Unify(result, value.clone())));
                Ok(Flow::Continue)
            }
            _ => Ok(Flow::Fail),
        }
    }

    fn filter(&mut self, mut f: Filter) -> EngineResult<Flow> {
        if f.asked {
            f.asked = false;
            let passed = self.take_answer()?;
            if let Some((rule, index)) = f.current.take() {
                if passed {
                    f.current = Some((rule, index + 1));
                }
            }
        }
        loop {
            let (rule, mut index) = match f.current.take() {
                Some(current) => current,
                None => match f.candidates.pop_front() {
                    Some(rule) => (rule, 0),
                    None => break,
                },
            };
            let mut rejected = false;
            while index < rule.params.len() {
                match self.check_param(&rule.params[index], &f.args[index]) {
                    Check::Pass => index += 1,
                    Check::Reject => {
                        rejected = true;
                        break;
                    }
                    Check::Ask(instance_id, class_tag) => {
                        f.current = Some((rule, index));
                        f.asked = true;
                        self.goals.push(Step::Filter(f));
                        return Ok(self.ask(|call_id| QueryEvent::ExternalIsa {
                            call_id,
                            instance_id,
                            class_tag,
                        }));
                    }
                }
            }
            if !rejected {
                f.applicable.push(rule);
            }
        }
        self.goals.push(Step::Sort(Sort {
            args: f.args,
            unsorted: f.applicable.into(),
            sorted: Vec::new(),
            inserting: None,
            asked: false,
        }));
        Ok(Flow::Continue)
    }

    fn check_param(&self, param: &Param, arg: &Term) -> Check {
        let class = match &param.specializer {
            Some(class) => class,
            None => return Check::Pass,
        };
        let holds = match self.walk(arg).value {
            Value::ExternalInstance(ExternalInstance { instance_id }) => {
                return Check::Ask(instance_id, class.clone())
            }
            Value::InstanceLiteral(lit) => lit.tag == *class,
            other => other.tag() == class.as_str(),
        };
        if holds {
            Check::Pass
        } else {
            Check::Reject
        }
    }

    fn sort(&mut self, mut s: Sort) -> EngineResult<Flow> {
        if s.asked {
            s.asked = false;
            let more_specific = self.take_answer()?;
            if let Some((rule, pos)) = s.inserting.take() {
                if more_specific {
                    s.sorted.insert(pos, rule);
                } else {
                    s.inserting = Some((rule, pos + 1));
                }
            }
        }
        loop {
            let (rule, mut pos) = match s.inserting.take() {
                Some(inserting) => inserting,
                None => match s.unsorted.pop_front() {
                    Some(rule) => (rule, 0),
                    None => break,
                },
            };
            loop {
                if pos >= s.sorted.len() {
                    s.sorted.push(rule);
                    break;
                }
                match self.order(&rule, &s.sorted[pos], &s.args) {
                    Order::Before => {
                        s.sorted.insert(pos, rule);
                        break;
                    }
                    Order::After => pos += 1,
                    Order::Ask(instance_id, left, right) => {
                        s.inserting = Some((rule, pos));
                        s.asked = true;
                        self.goals.push(Step::Sort(s));
                        return Ok(self.ask(|call_id| QueryEvent::ExternalIsSubSpecializer {
                            call_id,
                            instance_id,
                            left_class_tag: left,
                            right_class_tag: right,
                        }));
                    }
                }
            }
        }
        let alternatives = s
            .sorted
            .iter()
            .map(|rule| self.instantiate(rule, &s.args))
            .collect();
        Ok(self.fork(alternatives))
    }

    /// Whether `left` goes before `right` for these arguments. A specialized
    /// parameter beats an unspecialized one; two different specializers on
    /// an external argument are settled by the host.
    fn order(&self, left: &Rule, right: &Rule, args: &[Term]) -> Order {
        for (i, arg) in args.iter().enumerate() {
            match (&left.params[i].specializer, &right.params[i].specializer) {
                (Some(_), None) => return Order::Before,
                (None, Some(_)) => return Order::After,
                (Some(l), Some(r)) if l != r => {
                    return match self.walk(arg).value {
                        Value::ExternalInstance(ExternalInstance { instance_id }) => {
                            Order::Ask(instance_id, l.clone(), r.clone())
                        }
                        _ => Order::After,
                    }
                }
                _ => continue,
            }
        }
        Order::After
    }

    /// Steps that apply `rule` to `args`: head unification, then the body.
    fn instantiate(&mut self, rule: &Rule, args: &[Term]) -> Vec<Step> {
        self.renames += 1;
        let rule = rule.instantiate(self.renames);
        let mut steps: Vec<Step> = rule
            .params
            .into_iter()
            .zip(args)
            .map(|(param, arg)| Step::Goal(Goal::Unify(arg.clone(), param.term)))
            .collect();
        steps.extend(rule.body.into_iter().map(Step::Goal));
        steps
    }

    // -----------------------------------------------------------------------
    // Choice points and bindings
    // -----------------------------------------------------------------------

    /// Run the first alternative now; keep the rest for backtracking.
    fn fork(&mut self, mut alternatives: VecDeque<Vec<Step>>) -> Flow {
        let first = match alternatives.pop_front() {
            Some(first) => first,
            None => return Flow::Fail,
        };
        if !alternatives.is_empty() {
            self.choices.push(Choice {
                goals: self.goals.clone(),
                trail_len: self.trail.len(),
                alternatives,
            });
        }
        self.goals.extend(first.into_iter().rev());
        Flow::Continue
    }

    fn backtrack(&mut self) {
        self.answer = None;
        while let Some(choice) = self.choices.last_mut() {
            let next = match choice.alternatives.pop_front() {
                Some(next) => next,
                None => {
                    self.choices.pop();
                    continue;
                }
            };
            let mut goals = choice.goals.clone();
            let trail_len = choice.trail_len;
            if choice.alternatives.is_empty() {
                self.choices.pop();
            }
            self.undo(trail_len);
            goals.extend(next.into_iter().rev());
            self.goals = goals;
            return;
        }
        self.goals.clear();
        self.done = true;
    }

    fn undo(&mut self, trail_len: usize) {
        while self.trail.len() > trail_len {
            if let Some(var) = self.trail.pop() {
                self.bindings.remove(&var);
            }
        }
    }

    fn bind(&mut self, var: &Symbol, value: Term) {
        self.bindings.insert(var.0.clone(), value);
        self.trail.push(var.0.clone());
    }

    /// Follow variable bindings until reaching a non-variable or an
    /// unbound variable.
    fn walk(&self, term: &Term) -> Term {
        let mut current = term.clone();
        while let Value::Symbol(Symbol(name)) = &current.value {
            match self.bindings.get(name) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }
        current
    }

    /// `walk`, applied all the way down.
    fn resolve(&self, term: &Term) -> Term {
        let term = self.walk(term);
        let value = match term.value {
            Value::List(items) => Value::List(items.iter().map(|t| self.resolve(t)).collect()),
            Value::Dictionary(dict) => Value::Dictionary(self.resolve_dict(&dict)),
            Value::InstanceLiteral(lit) => Value::InstanceLiteral(InstanceLiteral {
                fields: self.resolve_dict(&lit.fields),
                tag: lit.tag,
            }),
            Value::Call(mut call) => {
                call.args = call.args.iter().map(|t| self.resolve(t)).collect();
                Value::Call(call)
            }
            other => other,
        };
        Term { id: term.id, offset: term.offset, value }
    }

    fn resolve_dict(&self, dict: &Dictionary) -> Dictionary {
        Dictionary {
            fields: dict
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), self.resolve(v)))
                .collect(),
        }
    }

    /// Unify two terms, binding variables as needed. Pairs of distinct
    /// external instances are collected in `deferred` for the host to
    /// decide.
    fn unify(&mut self, left: &Term, right: &Term, deferred: &mut Vec<(InstanceId, InstanceId)>) -> bool {
        let left = self.walk(left);
        let right = self.walk(right);
        match (&left.value, &right.value) {
            (Value::Symbol(l), Value::Symbol(r)) if l == r => true,
            (Value::Symbol(l), _) => {
                self.bind(l, right.clone());
                true
            }
            (_, Value::Symbol(r)) => {
                self.bind(r, left.clone());
                true
            }
            (Value::List(ls), Value::List(rs)) => {
                ls.len() == rs.len() && ls.iter().zip(rs).all(|(l, r)| self.unify(l, r, deferred))
            }
            (Value::Dictionary(l), Value::Dictionary(r)) => self.unify_dicts(l, r, deferred),
            (Value::InstanceLiteral(l), Value::InstanceLiteral(r)) => {
                l.tag == r.tag && self.unify_dicts(&l.fields, &r.fields, deferred)
            }
            (Value::Call(l), Value::Call(r)) => {
                l.name == r.name
                    && l.args.len() == r.args.len()
                    && l.args.iter().zip(&r.args).all(|(l, r)| self.unify(l, r, deferred))
            }
            (Value::ExternalInstance(l), Value::ExternalInstance(r)) => {
                if l.instance_id != r.instance_id {
                    deferred.push((l.instance_id, r.instance_id));
                }
                true
            }
            (l, r) => scalar_eq(l, r),
        }
    }

    fn unify_dicts(
        &mut self,
        left: &Dictionary,
        right: &Dictionary,
        deferred: &mut Vec<(InstanceId, InstanceId)>,
    ) -> bool {
        left.fields.len() == right.fields.len()
            && left.fields.iter().all(|(k, l)| match right.fields.get(k) {
                Some(r) => self.unify(l, r, deferred),
                None => false,
            })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn fresh_call_id(&mut self) -> CallId {
        self.next_call_id += 1;
        self.next_call_id
    }

    fn ask(&mut self, event: impl FnOnce(CallId) -> QueryEvent) -> Flow {
        let call_id = self.fresh_call_id();
        self.awaiting = Some(Awaiting::Question(call_id));
        Flow::Emit(event(call_id))
    }

    fn take_answer(&mut self) -> EngineResult<bool> {
        self.answer
            .take()
            .ok_or_else(|| protocol("resumed without an answer"))
    }

    /// Bindings of the reported variables, skipping `_`-prefixed and
    /// unbound ones.
    fn solution(&self) -> BTreeMap<String, Term> {
        self.vars
            .iter()
            .filter(|name| !name.starts_with('_'))
            .filter_map(|name| {
                let value = self.resolve(&Term::new(Value::Symbol(Symbol(name.clone()))));
                match value.value {
                    Value::Symbol(_) => None,
                    _ => Some((name.clone(), value)),
                }
            })
            .collect()
    }
}

fn pass_if(holds: bool) -> Flow {
    if holds {
        Flow::Continue
    } else {
        Flow::Fail
    }
}

/// Equality of non-compound values; integers and floats compare numerically.
fn scalar_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => l == r,
        (Value::Float(l), Value::Float(r)) => l == r,
        (Value::Integer(i), Value::Float(f)) | (Value::Float(f), Value::Integer(i)) => *i as f64 == *f,
        (Value::Boolean(l), Value::Boolean(r)) => l == r,
        (Value::String(l), Value::String(r)) => l == r,
        _ => false,
    }
}

/// Structural equality of resolved values, ignoring source positions.
fn value_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::List(ls), Value::List(rs)) => {
            ls.len() == rs.len() && ls.iter().zip(rs).all(|(l, r)| value_eq(&l.value, &r.value))
        }
        (Value::Dictionary(l), Value::Dictionary(r)) => dict_eq(l, r),
        (Value::InstanceLiteral(l), Value::InstanceLiteral(r)) => {
            l.tag == r.tag && dict_eq(&l.fields, &r.fields)
        }
        (Value::Call(l), Value::Call(r)) => {
            l.name == r.name
                && l.args.len() == r.args.len()
                && l.args.iter().zip(&r.args).all(|(l, r)| value_eq(&l.value, &r.value))
        }
        (Value::ExternalInstance(l), Value::ExternalInstance(r)) => l == r,
        (Value::Symbol(l), Value::Symbol(r)) => l == r,
        (l, r) => scalar_eq(l, r),
    }
}

fn dict_eq(left: &Dictionary, right: &Dictionary) -> bool {
    left.fields.len() == right.fields.len()
        && left
            .fields
            .iter()
            .all(|(k, l)| right.fields.get(k).is_some_and(|r| value_eq(&l.value, &r.value)))
}

fn compare(op: Comparison, left: &Value, right: &Value) -> EngineResult<bool> {
    use std::cmp::Ordering;

    if op == Comparison::Neq {
        return Ok(!value_eq(left, right));
    }
    let ordering = match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => Some(l.cmp(r)),
        (Value::Integer(l), Value::Float(r)) => (*l as f64).partial_cmp(r),
        (Value::Float(l), Value::Integer(r)) => l.partial_cmp(&(*r as f64)),
        (Value::Float(l), Value::Float(r)) => l.partial_cmp(r),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => {
            return Err(ErrorPayload::runtime(
                "TypeError",
                format!("cannot compare {} and {}", left, right),
            ))
        }
    };
    let ordering = match ordering {
        Some(ordering) => ordering,
        None => return Ok(false),
    };
    Ok(match op {
        Comparison::Lt => ordering == Ordering::Less,
        Comparison::Leq => ordering != Ordering::Greater,
        Comparison::Gt => ordering == Ordering::Greater,
        Comparison::Geq => ordering != Ordering::Less,
        Comparison::Neq => ordering != Ordering::Equal,
    })
}
